use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

pub fn user_prompt(question: &str) -> String {
    format!(
        "Answer this Kahoot question with ONLY the letter (A, B, C, or D) and a brief explanation: {}",
        question
    )
}

pub async fn generate(config: &AppConfig, question: &str) -> Result<String, String> {
    if config.anthropic_api_key.is_empty() {
        return Err("Anthropic API key not configured. Set ANTHROPIC_API_KEY.".to_string());
    }

    let client = Client::new();

    let request = MessagesRequest {
        model: config.anthropic_model.clone(),
        max_tokens: config.max_tokens,
        messages: vec![Message {
            role: "user".to_string(),
            content: user_prompt(question),
        }],
    };

    let url = format!("{}/messages", config.anthropic_base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .header("x-api-key", &config.anthropic_api_key)
        .header("anthropic-version", API_VERSION)
        .header("Content-Type", "application/json")
        .json(&request)
        .send()
        .await
        .map_err(|e| format!("Anthropic request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("Anthropic API error ({}): {}", status, body));
    }

    let body: MessagesResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse Anthropic response: {}", e))?;

    // Only the leading block counts, and it has to be text
    body.content
        .into_iter()
        .next()
        .filter(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| "Anthropic returned no text content".to_string())
}
