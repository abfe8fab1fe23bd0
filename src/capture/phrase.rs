//! Energy-threshold phrase detection.
//!
//! Audio is cut into fixed frames. The first few frames calibrate the
//! ambient noise floor; after that the detector waits for a frame louder
//! than the threshold, records until enough quiet frames follow, and stops.

use std::collections::VecDeque;

use crate::config::AppConfig;

pub const TIMEOUT_MESSAGE: &str = "listening timed out while waiting for phrase to start";

#[derive(Debug, Clone)]
pub struct PhraseConfig {
    pub sample_rate: u32,
    pub frame_ms: u64,
    pub calibration_ms: u64,
    pub onset_timeout_ms: u64,
    pub pause_ms: u64,
    pub max_phrase_ms: u64,
    pub preroll_ms: u64,
    /// Threshold is ambient RMS times this ratio.
    pub energy_ratio: f32,
    /// Floor for the threshold so a dead-silent room still needs real speech.
    pub min_energy: f32,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_ms: 30,
            calibration_ms: 200,
            onset_timeout_ms: 5_000,
            pause_ms: 800,
            max_phrase_ms: 30_000,
            preroll_ms: 300,
            energy_ratio: 1.5,
            min_energy: 0.01,
        }
    }
}

impl PhraseConfig {
    pub fn from_app(config: &AppConfig, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            calibration_ms: config.ambient_calibration_ms,
            onset_timeout_ms: config.listen_timeout_secs * 1_000,
            pause_ms: config.pause_ms,
            ..Self::default()
        }
    }

    fn frame_len(&self) -> usize {
        ((self.sample_rate as u64 * self.frame_ms) / 1_000).max(1) as usize
    }

    fn frames_for(&self, ms: u64) -> u64 {
        ms.div_ceil(self.frame_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseState {
    Calibrating,
    WaitingForSpeech,
    Speaking,
    Complete,
    TimedOut,
}

impl PhraseState {
    pub fn is_done(self) -> bool {
        matches!(self, PhraseState::Complete | PhraseState::TimedOut)
    }
}

pub struct PhraseDetector {
    config: PhraseConfig,
    frame_len: usize,
    pending: Vec<f32>,
    state: PhraseState,
    ambient_sum: f64,
    ambient_frames: u64,
    threshold: f32,
    waited_frames: u64,
    quiet_frames: u64,
    phrase_frames: u64,
    preroll: VecDeque<Vec<f32>>,
    phrase: Vec<f32>,
}

impl PhraseDetector {
    pub fn new(config: PhraseConfig) -> Self {
        let frame_len = config.frame_len();
        let state = if config.calibration_ms == 0 {
            PhraseState::WaitingForSpeech
        } else {
            PhraseState::Calibrating
        };
        Self {
            threshold: config.min_energy,
            config,
            frame_len,
            pending: Vec::with_capacity(frame_len),
            state,
            ambient_sum: 0.0,
            ambient_frames: 0,
            waited_frames: 0,
            quiet_frames: 0,
            phrase_frames: 0,
            preroll: VecDeque::new(),
            phrase: Vec::new(),
        }
    }

    pub fn state(&self) -> PhraseState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Feeds mono samples; returns the state after consuming them.
    pub fn push(&mut self, samples: &[f32]) -> PhraseState {
        for &sample in samples {
            if self.state.is_done() {
                break;
            }
            self.pending.push(sample);
            if self.pending.len() == self.frame_len {
                let frame = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_len));
                self.process_frame(frame);
            }
        }
        self.state
    }

    fn process_frame(&mut self, frame: Vec<f32>) {
        let energy = rms(&frame);
        match self.state {
            PhraseState::Calibrating => {
                self.ambient_sum += energy as f64;
                self.ambient_frames += 1;
                if self.ambient_frames >= self.config.frames_for(self.config.calibration_ms) {
                    let ambient = (self.ambient_sum / self.ambient_frames as f64) as f32;
                    self.threshold = (ambient * self.config.energy_ratio).max(self.config.min_energy);
                    log::debug!("ambient rms {:.4}, speech threshold {:.4}", ambient, self.threshold);
                    self.state = PhraseState::WaitingForSpeech;
                }
            }
            PhraseState::WaitingForSpeech => {
                if energy > self.threshold {
                    for earlier in self.preroll.drain(..) {
                        self.phrase.extend_from_slice(&earlier);
                    }
                    self.phrase.extend_from_slice(&frame);
                    self.phrase_frames = 1;
                    self.quiet_frames = 0;
                    self.state = PhraseState::Speaking;
                    return;
                }
                self.preroll.push_back(frame);
                while self.preroll.len() as u64 > self.config.frames_for(self.config.preroll_ms) {
                    self.preroll.pop_front();
                }
                self.waited_frames += 1;
                if self.waited_frames >= self.config.frames_for(self.config.onset_timeout_ms) {
                    self.state = PhraseState::TimedOut;
                }
            }
            PhraseState::Speaking => {
                self.phrase.extend_from_slice(&frame);
                self.phrase_frames += 1;
                if energy > self.threshold {
                    self.quiet_frames = 0;
                } else {
                    self.quiet_frames += 1;
                }
                if self.quiet_frames >= self.config.frames_for(self.config.pause_ms)
                    || self.phrase_frames >= self.config.frames_for(self.config.max_phrase_ms)
                {
                    self.state = PhraseState::Complete;
                }
            }
            PhraseState::Complete | PhraseState::TimedOut => {}
        }
    }

    /// Consumes the detector; a phrase that is still open is returned as is.
    pub fn into_phrase(mut self) -> Result<Vec<f32>, String> {
        match self.state {
            PhraseState::Complete => Ok(self.phrase),
            PhraseState::Speaking => {
                self.phrase.append(&mut self.pending);
                Ok(self.phrase)
            }
            PhraseState::TimedOut => Err(TIMEOUT_MESSAGE.to_string()),
            PhraseState::Calibrating | PhraseState::WaitingForSpeech => {
                Err("no speech captured".to_string())
            }
        }
    }
}

pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}
