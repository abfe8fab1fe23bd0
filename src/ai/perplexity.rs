use crate::config::AppConfig;

pub const NOT_IMPLEMENTED: &str = "Perplexity API not implemented";

/// Placeholder backend. Always answers with [`NOT_IMPLEMENTED`].
pub async fn generate(_config: &AppConfig, _question: &str) -> Result<String, String> {
    Ok(NOT_IMPLEMENTED.to_string())
}
