use std::path::PathBuf;
use std::sync::MutexGuard;

use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_opener::OpenerExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::config::ToolConfig;
use crate::app::controller::UiController;
use crate::app::error::AppError;
use crate::app::models::{
    CommandResponse, DrainUpdate, LogCursor, TaskConfiguration, TaskKind, ViewState,
};
use crate::app::sink::LogSender;
use crate::app::state::AppState;
use crate::app::tasks::spawn_task;


fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn ensure_non_empty(value: &str, field: &str, trace_id: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(
            format!("{field} is required"),
            trace_id,
        ));
    }
    Ok(())
}

fn lock_controller<'a>(
    state: &'a AppState,
    trace_id: &str,
) -> Result<MutexGuard<'a, UiController>, AppError> {
    state
        .controller
        .lock()
        .map_err(|_| AppError::system("UI state locked", trace_id))
}

fn respond<T>(trace_id: String, data: T) -> CommandResponse<T> {
    CommandResponse { trace_id, data }
}

/// Paths are taken verbatim; whitespace only matters for the emptiness check.
pub(crate) fn select_path_inner(
    state: &AppState,
    task: TaskKind,
    path: impl Into<PathBuf>,
    trace_id: &str,
) -> Result<ViewState, AppError> {
    let path = path.into();
    ensure_non_empty(&path.to_string_lossy(), "path", trace_id)?;
    let mut controller = lock_controller(state, trace_id)?;
    match task {
        TaskKind::Conversion => controller.select_bundle(path, trace_id)?,
        TaskKind::Installation => controller.select_archive(path, trace_id)?,
    }
    Ok(controller.view())
}

/// Validates through the controller, then hands the task configuration to `spawn`.
pub(crate) fn start_task_inner(
    state: &AppState,
    task: TaskKind,
    trace_id: &str,
    spawn: impl FnOnce(TaskConfiguration, ToolConfig, LogSender) -> Result<(), AppError>,
) -> Result<ViewState, AppError> {
    let mut controller = lock_controller(state, trace_id)?;
    let config = match task {
        TaskKind::Conversion => controller.begin_conversion(&state.tools, trace_id),
        TaskKind::Installation => controller.begin_installation(trace_id),
    }
    .inspect_err(|err| {
        if err.is_validation() {
            info!(trace_id = %trace_id, task = task.label(), error = %err.error, "task rejected");
        } else {
            warn!(trace_id = %trace_id, task = task.label(), error = %err, "task could not start");
        }
    })?;
    spawn(config, state.tools.clone(), state.log_sender.clone())?;
    Ok(controller.view())
}

pub(crate) fn drain_log_inner(
    state: &AppState,
    cursor: LogCursor,
    trace_id: &str,
) -> Result<DrainUpdate, AppError> {
    let receiver = state
        .log_receiver
        .lock()
        .map_err(|_| AppError::system("Log receiver locked", trace_id))?;
    let mut controller = lock_controller(state, trace_id)?;
    let drained = controller.drain(&receiver);
    Ok(DrainUpdate {
        drained,
        log: controller.log_since(cursor),
        view: controller.view(),
    })
}

fn spawn_detached(
    config: TaskConfiguration,
    tools: ToolConfig,
    sink: LogSender,
) -> Result<(), AppError> {
    spawn_task(config, tools, sink).map(|_| ())
}

#[tauri::command]
pub fn get_view(
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let view = lock_controller(&state, &trace_id)?.view();
    Ok(respond(trace_id, view))
}

#[tauri::command(async)]
pub fn pick_bundle(
    app: AppHandle,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let picked = app
        .dialog()
        .file()
        .set_title("Select an .aab file")
        .add_filter("Android App Bundle", &["aab"])
        .blocking_pick_file();
    pick_into(&state, TaskKind::Conversion, picked, trace_id)
}

#[tauri::command(async)]
pub fn pick_archive(
    app: AppHandle,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let picked = app
        .dialog()
        .file()
        .set_title("Select an .apks file")
        .add_filter("APK Set Archive", &["apks"])
        .blocking_pick_file();
    pick_into(&state, TaskKind::Installation, picked, trace_id)
}

fn pick_into(
    state: &AppState,
    task: TaskKind,
    picked: Option<tauri_plugin_dialog::FilePath>,
    trace_id: String,
) -> Result<CommandResponse<ViewState>, AppError> {
    let Some(file) = picked else {
        let view = lock_controller(state, &trace_id)?.view();
        return Ok(respond(trace_id, view));
    };
    let path = file
        .into_path()
        .map_err(|err| AppError::system(format!("Unsupported file location: {err}"), &trace_id))?;
    let view = select_path_inner(state, task, path, &trace_id)?;
    Ok(respond(trace_id, view))
}

#[tauri::command]
pub fn select_bundle(
    path: String,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let view = select_path_inner(&state, TaskKind::Conversion, path, &trace_id)?;
    Ok(respond(trace_id, view))
}

#[tauri::command]
pub fn select_archive(
    path: String,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let view = select_path_inner(&state, TaskKind::Installation, path, &trace_id)?;
    Ok(respond(trace_id, view))
}

#[tauri::command]
pub fn set_port(
    port: String,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let mut controller = lock_controller(&state, &trace_id)?;
    controller.set_port(&port, &trace_id)?;
    let view = controller.view();
    Ok(respond(trace_id, view))
}

#[tauri::command]
pub fn set_signing(
    enabled: bool,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let mut controller = lock_controller(&state, &trace_id)?;
    controller.set_signing(enabled, &trace_id)?;
    let view = controller.view();
    Ok(respond(trace_id, view))
}

#[tauri::command]
pub fn start_conversion(
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    info!(trace_id = %trace_id, "start_conversion");
    let view = start_task_inner(&state, TaskKind::Conversion, &trace_id, spawn_detached)?;
    Ok(respond(trace_id, view))
}

#[tauri::command]
pub fn start_installation(
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ViewState>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    info!(trace_id = %trace_id, "start_installation");
    let view = start_task_inner(&state, TaskKind::Installation, &trace_id, spawn_detached)?;
    Ok(respond(trace_id, view))
}

/// Called by the frontend timer every `DRAIN_INTERVAL_MS`.
#[tauri::command]
pub fn drain_log(
    cursor: Option<LogCursor>,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<DrainUpdate>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let update = drain_log_inner(&state, cursor.unwrap_or_default(), &trace_id)?;
    Ok(respond(trace_id, update))
}

#[tauri::command]
pub fn reveal_last_artifact(
    app: AppHandle,
    state: State<'_, AppState>,
    trace_id: Option<String>,
) -> Result<CommandResponse<String>, AppError> {
    let trace_id = resolve_trace_id(trace_id);
    let artifact = lock_controller(&state, &trace_id)?
        .last_artifact()
        .map(|path| path.to_path_buf())
        .ok_or_else(|| AppError::validation("No APKS file yet", &trace_id))?;
    app.opener()
        .reveal_item_in_dir(&artifact)
        .map_err(|err| AppError::system(format!("Failed to open folder: {err}"), &trace_id))?;
    Ok(respond(trace_id, artifact.display().to_string()))
}
