use super::{anthropic, error_reply, openai, perplexity, Backend, ResultSet};
use crate::config::AppConfig;

/// Runs one backend and folds any failure into an `"Error: ..."` reply.
pub async fn ask_backend(backend: Backend, config: &AppConfig, question: &str) -> String {
    let result = match backend {
        Backend::OpenAI => openai::generate(config, question).await,
        Backend::Anthropic => anthropic::generate(config, question).await,
        Backend::Perplexity => perplexity::generate(config, question).await,
    };

    match result {
        Ok(content) => content,
        Err(e) => {
            log::warn!("{} backend failed: {}", backend.key(), e);
            error_reply(&e)
        }
    }
}

/// Asks every backend the same question, one after another, in slot order.
///
/// The next backend is not contacted until the previous one has answered or
/// failed, so a request costs the sum of the three latencies.
pub async fn ask_all(config: &AppConfig, question: &str) -> ResultSet {
    let openai = ask_backend(Backend::OpenAI, config, question).await;
    let anthropic = ask_backend(Backend::Anthropic, config, question).await;
    let perplexity = ask_backend(Backend::Perplexity, config, question).await;

    ResultSet {
        openai,
        anthropic,
        perplexity,
    }
}

#[cfg(feature = "desktop")]
pub use slots::{dispatch_to_slots, SlotUpdate, SLOT_EVENT};

#[cfg(feature = "desktop")]
mod slots {
    use serde::Serialize;
    use tauri::{AppHandle, Emitter};

    use super::ask_backend;
    use crate::ai::{answer_letter, is_error_reply, Backend};
    use crate::config::AppConfig;

    pub const SLOT_EVENT: &str = "ai-response";

    #[derive(Debug, Clone, Serialize)]
    pub struct SlotUpdate {
        pub index: usize,
        pub backend: Backend,
        pub title: String,
        pub content: String,
        pub is_error: bool,
        pub letter: Option<char>,
        pub timestamp: String,
    }

    impl SlotUpdate {
        pub fn new(backend: Backend, content: String) -> Self {
            Self {
                index: backend.index(),
                backend,
                title: format!(
                    "AI {} Response ({})",
                    backend.index() + 1,
                    backend.display_name()
                ),
                is_error: is_error_reply(&content),
                letter: answer_letter(&content),
                content,
                timestamp: chrono::Utc::now().to_rfc3339(),
            }
        }
    }

    /// Starts one task per backend; each task only ever writes its own slot.
    pub fn dispatch_to_slots(app: &AppHandle, config: &AppConfig, question: &str) {
        for backend in Backend::ALL {
            let app = app.clone();
            let config = config.clone();
            let question = question.to_string();
            tauri::async_runtime::spawn(async move {
                let content = ask_backend(backend, &config, &question).await;
                log::debug!("{} answered: {}", backend.key(), content);
                let _ = app.emit(SLOT_EVENT, SlotUpdate::new(backend, content));
            });
        }
    }

}
