pub mod ai;
pub mod capture;
pub mod config;
pub mod http;

#[cfg(feature = "desktop")]
mod desktop;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tauri::Manager;
    use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};

    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .setup(|app| {
            // ─── State Management ────────────────────────────────────────
            let app_data = app
                .path()
                .app_data_dir()
                .expect("Failed to get app data dir");
            std::fs::create_dir_all(&app_data).ok();

            let app_config = config::AppConfig::load(&app_data);
            let hotkey = app_config.hotkey.clone();
            app.manage(Arc::new(Mutex::new(app_config)));
            app.manage(Arc::new(Mutex::new(capture::ListenController::new())));

            // ─── Global Hotkey ───────────────────────────────────────────
            let app_handle = app.handle().clone();
            let registered = app.global_shortcut().on_shortcut(
                hotkey.as_str(),
                move |_app, _shortcut, event| {
                    if event.state() == ShortcutState::Pressed {
                        desktop::toggle_listening(&app_handle);
                    }
                },
            );
            match registered {
                Ok(()) => log::info!("Trivia helper initialized. Hotkey: {}", hotkey),
                Err(e) => log::warn!("Could not register hotkey {}: {}", hotkey, e),
            }

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Config
            config::get_config,
            config::update_config,
            // Listening
            desktop::start_listening,
            desktop::get_listen_status,
            // Typed questions
            desktop::ask_typed_question,
        ])
        .run(tauri::generate_context!())
        .expect("error while running trivia helper");
}
