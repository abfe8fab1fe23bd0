use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    pub max_tokens: u32,
    pub bind_addr: String,
    pub whisper_model: String,
    pub listen_timeout_secs: u64,
    pub ambient_calibration_ms: u64,
    pub pause_ms: u64,
    pub hotkey: String,
    /// Budget for reading one HTTP request before answering 408.
    pub request_read_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_api_key: String::new(),
            anthropic_model: "claude-3-sonnet-20240229".to_string(),
            anthropic_base_url: "https://api.anthropic.com/v1".to_string(),
            max_tokens: 50,
            bind_addr: "0.0.0.0:5001".to_string(),
            whisper_model: "whisper-1".to_string(),
            listen_timeout_secs: 5,
            ambient_calibration_ms: 200,
            pause_ms: 800,
            hotkey: "CmdOrCtrl+Shift+K".to_string(),
            request_read_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// Defaults plus whatever the process environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    pub fn load(app_data: &Path) -> Self {
        let config_path = app_data.join("config.json");
        let mut config = if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("Ignoring unreadable {}: {}", config_path.display(), e);
                    Self::default()
                }),
                Err(_) => Self::default(),
            }
        } else {
            let c = Self::default();
            c.save(app_data);
            c
        };

        // Credentials from the environment always win over the file
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    pub fn save(&self, app_data: &Path) {
        let config_path = app_data.join("config.json");
        if let Ok(content) = serde_json::to_string_pretty(self) {
            if let Err(e) = std::fs::write(&config_path, content) {
                log::warn!("Failed to write {}: {}", config_path.display(), e);
            }
        }
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 8] = [
            ("OPENAI_API_KEY", &mut self.openai_api_key),
            ("OPENAI_MODEL", &mut self.openai_model),
            ("OPENAI_BASE_URL", &mut self.openai_base_url),
            ("ANTHROPIC_API_KEY", &mut self.anthropic_api_key),
            ("ANTHROPIC_MODEL", &mut self.anthropic_model),
            ("ANTHROPIC_BASE_URL", &mut self.anthropic_base_url),
            ("TRIVIA_BIND", &mut self.bind_addr),
            ("WHISPER_MODEL", &mut self.whisper_model),
        ];

        for (name, field) in fields {
            if let Some(value) = lookup(name) {
                let value = value.trim();
                if !value.is_empty() {
                    *field = value.to_string();
                }
            }
        }
    }
}

#[cfg(feature = "desktop")]
pub type ConfigState = std::sync::Arc<parking_lot::Mutex<AppConfig>>;

#[cfg(feature = "desktop")]
#[tauri::command]
pub fn get_config(config: tauri::State<'_, ConfigState>) -> AppConfig {
    config.lock().clone()
}

#[cfg(feature = "desktop")]
#[tauri::command]
pub fn update_config(
    app: tauri::AppHandle,
    config_state: tauri::State<'_, ConfigState>,
    new_config: AppConfig,
) -> Result<(), String> {
    use tauri::Manager;

    let app_data = app
        .path()
        .app_data_dir()
        .map_err(|e: tauri::Error| e.to_string())?;
    new_config.save(&app_data);
    *config_state.lock() = new_config;
    Ok(())
}
