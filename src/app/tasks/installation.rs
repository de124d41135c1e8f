use std::path::PathBuf;

use tracing::{info, warn};

use crate::app::bundletool::{connect_args, install_apks_args};
use crate::app::config::ToolConfig;
use crate::app::error::AppError;
use crate::app::models::{InstallRequest, TaskOutcome};
use crate::app::process::locator::display_name;
use crate::app::process::runner::{run_command, CommandOutput, StreamingCommand};
use crate::app::sink::LogSender;
use crate::app::tasks::exit_label;

/// adb sometimes reports a refused connection on stdout with exit status 0.
pub const CONNECT_FAILURE_PHRASES: [&str; 2] = ["unable to connect", "failed to connect"];

pub fn connect_failed(output: &CommandOutput) -> bool {
    if !output.success() {
        return true;
    }
    let stdout = output.stdout.to_lowercase();
    CONNECT_FAILURE_PHRASES
        .iter()
        .any(|phrase| stdout.contains(phrase))
}

pub fn check_connect(output: &CommandOutput, device_id: &str, trace_id: &str) -> Result<(), AppError> {
    if !output.success() {
        return Err(AppError::process(
            format!("adb connect {device_id} failed with {}", exit_label(output.exit_code)),
            trace_id,
        ));
    }
    if connect_failed(output) {
        return Err(AppError::protocol(
            format!("adb connect {device_id} reported: {}", output.stdout.trim()),
            trace_id,
        ));
    }
    Ok(())
}

pub fn run_installation(
    request: &InstallRequest,
    tools: &ToolConfig,
    sink: &LogSender,
    locate_adb: impl FnOnce() -> Option<PathBuf>,
) -> Result<TaskOutcome, AppError> {
    let trace_id = request.trace_id.as_str();

    let Some(adb) = locate_adb() else {
        warn!(trace_id = %trace_id, "adb not found on PATH");
        sink.text("Error: the 'adb' command was not found.");
        sink.text("Install Android SDK Platform-Tools and add it to the PATH environment variable.");
        return Ok(TaskOutcome::Failed);
    };
    let device_id = request.device_id();
    let adb_program = adb.to_string_lossy().to_string();

    sink.text(format!("Found ADB: {}", adb.display()));
    sink.text(format!("Target device: {device_id}"));
    sink.text(format!("Connecting adb to {device_id}..."));

    let connect = run_command(&adb_program, &connect_args(&device_id), trace_id)?;
    if let Err(err) = check_connect(&connect, &device_id, trace_id) {
        warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "adb connect failed");
        sink.text("--- ADB connection failed ---");
        sink.block(&connect.stdout);
        sink.block(&connect.stderr);
        sink.text("Please check:");
        sink.text("1. The emulator is running.");
        sink.text("2. ADB is enabled in the emulator settings.");
        sink.text("3. The port number is correct.");
        return Ok(TaskOutcome::Failed);
    }
    info!(trace_id = %trace_id, device_id = %device_id, "adb connected");
    sink.text(format!("ADB connected: {}", connect.stdout.trim()));
    sink.text(format!(
        "Installing {} to device {device_id}...",
        display_name(&request.artifact_path)
    ));

    let args = install_apks_args(tools, &request.artifact_path, &adb, &device_id);
    let mut command = StreamingCommand::spawn(
        &tools.launcher_program,
        &args,
        tools.working_dir(),
        trace_id,
    )?;
    for line in command.lines() {
        sink.text(line);
    }
    let output = command.finish()?;
    if !output.stdout.is_empty() {
        sink.block(&output.stdout);
    }

    if !output.success() {
        let err = AppError::process(
            format!("install-apks failed with {}", exit_label(output.exit_code)),
            trace_id,
        );
        warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "installation failed");
        sink.blank();
        sink.text("--- Installation failed ---");
        sink.block(&output.stderr);
        sink.text(err.error);
        return Ok(TaskOutcome::Failed);
    }

    info!(trace_id = %trace_id, device_id = %device_id, "installation finished");
    sink.blank();
    sink.text("--- Done ---");
    sink.text("The app was installed on the emulator!");
    Ok(TaskOutcome::Succeeded { artifact: None })
}
