use reqwest::Client;
use serde::Deserialize;

use crate::config::AppConfig;

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribe a WAV clip using the OpenAI Whisper API
pub async fn transcribe(config: &AppConfig, audio_wav: Vec<u8>) -> Result<String, String> {
    if config.openai_api_key.is_empty() {
        return Err("OpenAI API key not configured".to_string());
    }

    let client = Client::new();

    let part = reqwest::multipart::Part::bytes(audio_wav)
        .file_name("question.wav")
        .mime_str("audio/wav")
        .map_err(|e| format!("MIME error: {}", e))?;

    let form = reqwest::multipart::Form::new()
        .text("model", config.whisper_model.clone())
        .text("language", "en")
        .text("response_format", "json")
        .part("file", part);

    let url = format!(
        "{}/audio/transcriptions",
        config.openai_base_url.trim_end_matches('/')
    );

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.openai_api_key))
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("Whisper API request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Whisper API error ({}): {}", status, body));
    }

    let result: WhisperResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse Whisper response: {}", e))?;

    let text = result.text.trim();
    if text.is_empty() {
        return Err("speech was not understood".to_string());
    }
    Ok(text.to_string())
}
