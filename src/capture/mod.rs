pub mod audio;
pub mod phrase;

use serde::Serialize;

pub const LISTEN_BUTTON: &str = "🎤 Click & Speak Question";
pub const STOP_BUTTON: &str = "⏹ Stop Listening";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message")]
pub enum ListenStatus {
    Ready,
    Listening,
    Processing,
    Error(String),
}

impl ListenStatus {
    pub fn label(&self) -> String {
        match self {
            ListenStatus::Ready => "Status: Ready".to_string(),
            ListenStatus::Listening => "Status: Listening...".to_string(),
            ListenStatus::Processing => "Status: Processing...".to_string(),
            ListenStatus::Error(message) => format!("Status: Error - {}", message),
        }
    }
}

/// What the UI needs to redraw the status line and the listen button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub status: ListenStatus,
    pub label: String,
    pub is_listening: bool,
    pub button: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started(u64),
    Stopped,
}

/// Tracks the single listen session the button controls.
///
/// Each start bumps the session id. Workers hold on to the id they were
/// started with, and any update they make after the user stopped (or
/// restarted) is dropped.
#[derive(Debug)]
pub struct ListenController {
    is_listening: bool,
    status: ListenStatus,
    session: u64,
}

impl Default for ListenController {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenController {
    pub fn new() -> Self {
        Self {
            is_listening: false,
            status: ListenStatus::Ready,
            session: 0,
        }
    }

    pub fn toggle(&mut self) -> Toggle {
        self.session += 1;
        if self.is_listening {
            self.is_listening = false;
            self.status = ListenStatus::Ready;
            Toggle::Stopped
        } else {
            self.is_listening = true;
            self.status = ListenStatus::Listening;
            Toggle::Started(self.session)
        }
    }

    pub fn is_current(&self, session: u64) -> bool {
        self.is_listening && self.session == session
    }

    pub fn set_processing(&mut self, session: u64) -> bool {
        if !self.is_current(session) {
            return false;
        }
        self.status = ListenStatus::Processing;
        true
    }

    pub fn finish(&mut self, session: u64) -> bool {
        if !self.is_current(session) {
            return false;
        }
        self.is_listening = false;
        self.status = ListenStatus::Ready;
        true
    }

    pub fn fail(&mut self, session: u64, message: impl Into<String>) -> bool {
        if !self.is_current(session) {
            return false;
        }
        self.is_listening = false;
        self.status = ListenStatus::Error(message.into());
        true
    }

    pub fn view(&self) -> StatusView {
        StatusView {
            status: self.status.clone(),
            label: self.status.label(),
            is_listening: self.is_listening,
            button: if self.is_listening {
                STOP_BUTTON
            } else {
                LISTEN_BUTTON
            },
        }
    }
}
