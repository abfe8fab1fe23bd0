use std::time::Instant;

use super::phrase::PhraseDetector;

pub const STOPPED_MESSAGE: &str = "listening stopped";

/// A recorded phrase, mono, at the capture device's rate.
#[derive(Debug, Clone)]
pub struct CapturedPhrase {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CapturedPhrase {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate.max(1) as f32
    }

    pub fn to_wav(&self) -> Result<Vec<u8>, String> {
        encode_wav(&self.samples, self.sample_rate)
    }
}

/// Encode mono f32 samples as 16-bit PCM WAV bytes (for STT upload)
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, String> {
    if samples.is_empty() {
        return Err("No audio data".to_string());
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| format!("WAV error: {}", e))?;

    for &sample in samples {
        let s = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(s)
            .map_err(|e| format!("WAV write error: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("WAV finalize error: {}", e))?;

    Ok(cursor.into_inner())
}

/// Averages interleaved channels down to mono and appends to `out`.
pub fn append_downmixed(out: &mut Vec<f32>, data: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }
    out.extend(
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
    );
}

/// Why [`drive_detector`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    /// The detector reached `Complete` or `TimedOut`.
    Settled,
    /// The caller asked to stop.
    Stopped,
    /// The deadline passed before the detector settled.
    Stalled,
}

/// Feeds chunks into `detector` until it settles, `should_stop` fires, or
/// `deadline` passes. `should_stop` is checked before every chunk.
pub fn drive_detector(
    detector: &mut PhraseDetector,
    mut next_chunk: impl FnMut() -> Vec<f32>,
    should_stop: impl Fn() -> bool,
    deadline: Instant,
) -> CaptureEnd {
    while !detector.state().is_done() {
        if should_stop() {
            return CaptureEnd::Stopped;
        }
        if Instant::now() >= deadline {
            return CaptureEnd::Stalled;
        }
        let chunk = next_chunk();
        detector.push(&chunk);
    }
    CaptureEnd::Settled
}

/// Listens on the default input device until the detector settles or
/// `should_stop` returns true. The input stream is dropped before returning.
///
/// Blocks the calling thread; run it on a blocking worker.
#[cfg(feature = "desktop")]
pub fn record_phrase(
    config: &crate::config::AppConfig,
    should_stop: impl Fn() -> bool,
) -> Result<CapturedPhrase, String> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    use super::phrase::PhraseConfig;

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "No input device available".to_string())?;

    let input_config = device
        .default_input_config()
        .map_err(|e| format!("Failed to get input config: {}", e))?;

    let sample_rate = input_config.sample_rate().0;
    let channels = input_config.channels() as usize;
    let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));

    let stream = match input_config.sample_format() {
        cpal::SampleFormat::F32 => {
            let buffer = buffer.clone();
            device
                .build_input_stream(
                    &input_config.into(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        append_downmixed(&mut buffer.lock(), data, channels);
                    },
                    |err| {
                        log::error!("Audio stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| format!("Failed to build stream: {}", e))?
        }
        cpal::SampleFormat::I16 => {
            let buffer = buffer.clone();
            device
                .build_input_stream(
                    &input_config.into(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        append_downmixed(&mut buffer.lock(), &floats, channels);
                    },
                    |err| {
                        log::error!("Audio stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| format!("Failed to build stream: {}", e))?
        }
        format => {
            return Err(format!("Unsupported sample format: {:?}", format));
        }
    };

    stream
        .play()
        .map_err(|e| format!("Failed to start stream: {}", e))?;

    log::info!(
        "Listening on {} at {}Hz",
        device.name().unwrap_or_default(),
        sample_rate
    );

    let phrase_config = PhraseConfig::from_app(config, sample_rate);
    // Hard stop in case the device stalls and never delivers samples
    let deadline = Instant::now()
        + Duration::from_millis(
            phrase_config.calibration_ms
                + phrase_config.onset_timeout_ms
                + phrase_config.max_phrase_ms
                + 1_000,
        );
    let mut detector = PhraseDetector::new(phrase_config);

    let end = drive_detector(
        &mut detector,
        || {
            std::thread::sleep(Duration::from_millis(50));
            std::mem::take(&mut *buffer.lock())
        },
        should_stop,
        deadline,
    );

    drop(stream);

    match end {
        CaptureEnd::Stopped => {
            log::info!("Listening stopped before the phrase settled");
            return Err(STOPPED_MESSAGE.to_string());
        }
        CaptureEnd::Stalled => log::warn!("Audio device stopped delivering samples"),
        CaptureEnd::Settled => {}
    }

    let samples = detector.into_phrase()?;
    Ok(CapturedPhrase {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::*;
    use crate::capture::phrase::{PhraseConfig, PhraseState};

    fn detector() -> PhraseDetector {
        PhraseDetector::new(PhraseConfig {
            sample_rate: 1_000,
            frame_ms: 10,
            calibration_ms: 200,
            onset_timeout_ms: 1_000,
            pause_ms: 300,
            max_phrase_ms: 2_000,
            preroll_ms: 50,
            energy_ratio: 1.5,
            min_energy: 0.01,
        })
    }

    fn chunk(amplitude: f32) -> Vec<f32> {
        (0..100)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn wav_header_matches_capture_rate() {
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0) - 0.5).collect();
        let bytes = encode_wav(&samples, 48_000).unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 480);
    }

    #[test]
    fn out_of_range_samples_are_clipped() {
        let bytes = encode_wav(&[2.0, -2.0, 0.0], 16_000).unwrap();
        let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, vec![32767, -32768, 0]);
    }

    #[test]
    fn empty_capture_is_rejected() {
        assert_eq!(encode_wav(&[], 16_000).unwrap_err(), "No audio data");
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let mut out = Vec::new();
        append_downmixed(&mut out, &[1.0, -1.0, 0.5, 0.5], 2);
        assert_eq!(out, vec![0.0, 0.5]);

        append_downmixed(&mut out, &[0.25], 1);
        assert_eq!(out, vec![0.0, 0.5, 0.25]);
    }

    #[test]
    fn phrase_duration_uses_its_own_rate() {
        let phrase = CapturedPhrase {
            samples: vec![0.0; 22_050],
            sample_rate: 44_100,
        };
        assert!((phrase.duration_secs() - 0.5).abs() < 1e-6);
        assert!(phrase.to_wav().is_ok());
    }

    #[test]
    fn stop_request_ends_capture_between_chunks() {
        let mut det = detector();
        let pulled = Cell::new(0);
        let end = drive_detector(
            &mut det,
            || {
                pulled.set(pulled.get() + 1);
                chunk(0.005)
            },
            || pulled.get() >= 3,
            far_deadline(),
        );
        assert_eq!(end, CaptureEnd::Stopped);
        assert_eq!(pulled.get(), 3);
        assert_eq!(det.state(), PhraseState::WaitingForSpeech);
    }

    #[test]
    fn capture_runs_until_the_phrase_settles() {
        let mut det = detector();
        let pulled = Cell::new(0u32);
        let end = drive_detector(
            &mut det,
            || {
                pulled.set(pulled.get() + 1);
                // 200 ms of room noise, 500 ms of speech, then quiet
                match pulled.get() {
                    1..=2 => chunk(0.005),
                    3..=7 => chunk(0.5),
                    _ => chunk(0.005),
                }
            },
            || false,
            far_deadline(),
        );
        assert_eq!(end, CaptureEnd::Settled);
        assert_eq!(det.state(), PhraseState::Complete);
        assert!(det.into_phrase().is_ok());
    }

    #[test]
    fn passed_deadline_stalls_without_pulling() {
        let mut det = detector();
        let pulled = Cell::new(0);
        let end = drive_detector(
            &mut det,
            || {
                pulled.set(pulled.get() + 1);
                chunk(0.5)
            },
            || false,
            Instant::now(),
        );
        assert_eq!(end, CaptureEnd::Stalled);
        assert_eq!(pulled.get(), 0);
    }
}
