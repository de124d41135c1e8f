pub mod conversion;
pub mod installation;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::app::config::ToolConfig;
use crate::app::error::{AppError, ERR_LAUNCH};
use crate::app::models::{TaskConfiguration, TaskKind, TaskOutcome};
use crate::app::process::locator::locate_adb;
use crate::app::sink::LogSender;

/// Starts the worker thread for one task.
///
/// If the thread cannot be created the terminal entry is sent from here, so the
/// UI side still leaves its busy state on the next drain.
pub fn spawn_task(
    config: TaskConfiguration,
    tools: ToolConfig,
    sink: LogSender,
) -> Result<JoinHandle<TaskOutcome>, AppError> {
    let kind = config.kind();
    let trace_id = config.trace_id().to_string();
    let worker_sink = sink.clone();
    thread::Builder::new()
        .name(format!("{}-worker", kind.label()))
        .spawn(move || run_task(config, &tools, &worker_sink, locate_adb))
        .map_err(|err| {
            let err = AppError::system(format!("Failed to start worker thread: {err}"), &trace_id);
            sink.text(format!("Error: {}", err.error));
            sink.finished(kind, TaskOutcome::Failed);
            err
        })
}

pub fn run_task(
    config: TaskConfiguration,
    tools: &ToolConfig,
    sink: &LogSender,
    locate_adb: impl FnOnce() -> Option<PathBuf>,
) -> TaskOutcome {
    let kind = config.kind();
    let trace_id = config.trace_id().to_string();
    run_guarded(kind, &trace_id, sink, move || match config {
        TaskConfiguration::Conversion(request) => {
            conversion::run_conversion(&request, tools, sink)
        }
        TaskConfiguration::Installation(request) => {
            installation::run_installation(&request, tools, sink, locate_adb)
        }
    })
}

/// Task boundary: errors and panics become log lines, and the terminal entry is
/// always the last thing sent.
pub(crate) fn run_guarded(
    kind: TaskKind,
    trace_id: &str,
    sink: &LogSender,
    body: impl FnOnce() -> Result<TaskOutcome, AppError>,
) -> TaskOutcome {
    info!(trace_id = %trace_id, task = kind.label(), "task started");
    let outcome = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            warn!(trace_id = %trace_id, task = kind.label(), code = %err.code, error = %err.error, "task failed");
            if err.code == ERR_LAUNCH {
                sink.text(format!("Error: {}", err.error));
            } else {
                sink.text(format!("Unexpected error: {}", err.error));
            }
            TaskOutcome::Failed
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(trace_id = %trace_id, task = kind.label(), error = %message, "task panicked");
            sink.text(format!("Unexpected error: {message}"));
            TaskOutcome::Failed
        }
    };
    info!(trace_id = %trace_id, task = kind.label(), success = outcome.is_success(), "task finished");
    sink.finished(kind, outcome.clone());
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

pub(crate) fn exit_label(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}
