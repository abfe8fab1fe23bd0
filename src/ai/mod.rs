pub mod anthropic;
pub mod dispatch;
pub mod openai;
pub mod perplexity;
pub mod stt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix that marks a backend reply as a failure rather than an answer.
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    OpenAI,
    Anthropic,
    Perplexity,
}

impl Backend {
    /// Slot order used by the desktop panel.
    pub const ALL: [Backend; 3] = [Backend::OpenAI, Backend::Anthropic, Backend::Perplexity];

    pub fn key(self) -> &'static str {
        match self {
            Backend::OpenAI => "openai",
            Backend::Anthropic => "anthropic",
            Backend::Perplexity => "perplexity",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Backend::OpenAI => "OpenAI",
            Backend::Anthropic => "Anthropic",
            Backend::Perplexity => "Perplexity",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Backend::OpenAI => 0,
            Backend::Anthropic => 1,
            Backend::Perplexity => 2,
        }
    }
}

/// One answer per backend. The three fields are the only keys ever serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultSet {
    pub openai: String,
    pub anthropic: String,
    pub perplexity: String,
}

impl ResultSet {
    pub fn get(&self, backend: Backend) -> &str {
        match backend {
            Backend::OpenAI => &self.openai,
            Backend::Anthropic => &self.anthropic,
            Backend::Perplexity => &self.perplexity,
        }
    }
}

pub fn error_reply(message: &str) -> String {
    format!("{}{}", ERROR_PREFIX, message)
}

pub fn is_error_reply(reply: &str) -> bool {
    reply.starts_with(ERROR_PREFIX)
}

static ANSWER_LETTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\s*_\[]*(?:\(([A-Da-d])\)|([A-D])(?:[\s).:,\]*_-]|$))")
        .expect("answer letter pattern")
});

/// Leading multiple-choice letter of a reply, e.g. `B` for "B) 4, because...".
pub fn answer_letter(reply: &str) -> Option<char> {
    if is_error_reply(reply) {
        return None;
    }
    ANSWER_LETTER
        .captures(reply)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase())
}
