use parking_lot::Mutex;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Manager};

use crate::ai::{dispatch, stt};
use crate::capture::{audio, ListenController, StatusView, Toggle};
use crate::config::{AppConfig, ConfigState};

pub type ListenState = Arc<Mutex<ListenController>>;

pub const STATUS_EVENT: &str = "listen-status";
pub const QUESTION_EVENT: &str = "question-transcribed";

fn emit_status(app: &AppHandle, view: &StatusView) {
    log::info!("{}", view.label);
    let _ = app.emit(STATUS_EVENT, view);
}

/// Flips the listen button. Starting spawns a capture session worker.
pub fn toggle_listening(app: &AppHandle) -> StatusView {
    let listen = app.state::<ListenState>();
    let (toggle, view) = {
        let mut ctl = listen.lock();
        let toggle = ctl.toggle();
        (toggle, ctl.view())
    };
    emit_status(app, &view);

    if let Toggle::Started(session) = toggle {
        let cfg = app.state::<ConfigState>().lock().clone();
        let handle = app.clone();
        tauri::async_runtime::spawn(async move {
            listen_session(handle, cfg, session).await;
        });
    }

    view
}

async fn listen_session(app: AppHandle, cfg: AppConfig, session: u64) {
    let question = match capture_question(&app, &cfg, session).await {
        Ok(Some(question)) => question,
        Ok(None) => {
            log::debug!("Listen session {} was stopped, dropping result", session);
            return;
        }
        Err(e) => {
            log::error!("Listen session {} failed: {}", session, e);
            update(&app, |ctl| ctl.fail(session, e));
            return;
        }
    };

    log::info!("Transcribed question: {}", question);
    let _ = app.emit(QUESTION_EVENT, &question);
    dispatch::dispatch_to_slots(&app, &cfg, &question);
    update(&app, |ctl| ctl.finish(session));
}

/// Records and transcribes one phrase; `None` when the session went stale.
async fn capture_question(
    app: &AppHandle,
    cfg: &AppConfig,
    session: u64,
) -> Result<Option<String>, String> {
    let capture_cfg = cfg.clone();
    let listen = app.state::<ListenState>().inner().clone();
    // Stopping the session releases the microphone at the next chunk
    let recorded = tauri::async_runtime::spawn_blocking(move || {
        audio::record_phrase(&capture_cfg, || !listen.lock().is_current(session))
    })
    .await
    .map_err(|e| format!("capture worker failed: {}", e))?;

    let phrase = match recorded {
        Ok(phrase) => phrase,
        Err(e) if e == audio::STOPPED_MESSAGE => return Ok(None),
        Err(e) => return Err(e),
    };

    log::debug!("Captured {:.1}s of speech", phrase.duration_secs());

    if !update(app, |ctl| ctl.set_processing(session)) {
        return Ok(None);
    }

    let wav = phrase.to_wav()?;
    let text = stt::transcribe(cfg, wav).await?;

    let still_current = app.state::<ListenState>().lock().is_current(session);
    Ok(still_current.then_some(text))
}

/// Applies a controller change and emits the new status if it took effect.
fn update(app: &AppHandle, change: impl FnOnce(&mut ListenController) -> bool) -> bool {
    let listen = app.state::<ListenState>();
    let view = {
        let mut ctl = listen.lock();
        if !change(&mut ctl) {
            return false;
        }
        ctl.view()
    };
    emit_status(app, &view);
    true
}

#[tauri::command]
pub fn start_listening(app: AppHandle) -> StatusView {
    toggle_listening(&app)
}

#[tauri::command]
pub fn get_listen_status(listen: tauri::State<'_, ListenState>) -> StatusView {
    listen.lock().view()
}

#[tauri::command]
pub fn ask_typed_question(
    app: AppHandle,
    config: tauri::State<'_, ConfigState>,
    question: String,
) -> Result<(), String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Type a question first".to_string());
    }
    let cfg = config.lock().clone();
    dispatch::dispatch_to_slots(&app, &cfg, question);
    Ok(())
}
