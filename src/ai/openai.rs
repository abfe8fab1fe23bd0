use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for a Kahoot trivia game. \
     Provide ONLY the letter of the correct answer (A, B, C, or D) followed by a brief explanation. \
     Be extremely concise.";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

pub async fn generate(config: &AppConfig, question: &str) -> Result<String, String> {
    if config.openai_api_key.is_empty() {
        return Err("OpenAI API key not configured. Set OPENAI_API_KEY.".to_string());
    }

    let client = Client::new();

    let request = OpenAIRequest {
        model: config.openai_model.clone(),
        messages: vec![
            OpenAIMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            OpenAIMessage {
                role: "user".to_string(),
                content: format!("Question: {}", question),
            },
        ],
        max_tokens: config.max_tokens,
    };

    let url = format!("{}/chat/completions", config.openai_base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.openai_api_key))
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
        .map_err(|e| format!("OpenAI request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("OpenAI API error ({}): {}", status, body));
    }

    let body: OpenAIResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse OpenAI response: {}", e))?;

    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| "OpenAI returned no answer".to_string())
}
