use tracing::{debug, info, warn};

use crate::app::archive::{extract_universal_apk, ExtractError};
use crate::app::bundletool::{build_apks_args, UNIVERSAL_ENTRY};
use crate::app::config::ToolConfig;
use crate::app::error::AppError;
use crate::app::models::{ConversionRequest, TaskOutcome};
use crate::app::process::locator::display_name;
use crate::app::process::runner::StreamingCommand;
use crate::app::sink::{LogSender, BANNER_RULE};
use crate::app::tasks::exit_label;

pub fn run_conversion(
    request: &ConversionRequest,
    tools: &ToolConfig,
    sink: &LogSender,
) -> Result<TaskOutcome, AppError> {
    let trace_id = request.trace_id.as_str();
    let archive_name = display_name(&request.output_path);

    sink.text(BANNER_RULE);
    sink.text(format!("Converting: {}", display_name(&request.bundle_path)));
    sink.text(format!("   Output: {archive_name}"));
    match &request.signing {
        Some(signing) => sink.text(format!("   Signing: alias '{}'", signing.key_alias)),
        None => sink.text("   Signing: disabled, the archive will be unsigned"),
    }
    sink.text(BANNER_RULE);
    sink.blank();

    let args = build_apks_args(
        tools,
        &request.bundle_path,
        &request.output_path,
        request.signing.as_ref(),
    );
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
            format!("build-apks failed with {}", exit_label(output.exit_code)),
            trace_id,
        );
        warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "conversion failed");
        sink.blank();
        sink.text("--- Error ---");
        sink.block(&output.stderr);
        sink.text(err.error);
        sink.blank();
        sink.text("Conversion failed. Check the error messages above.");
        return Ok(TaskOutcome::Failed);
    }
    if !output.stderr.trim().is_empty() {
        debug!(trace_id = %trace_id, stderr = %output.stderr.trim(), "build-apks stderr");
    }

    info!(trace_id = %trace_id, output = %request.output_path.display(), "archive created");
    sink.blank();
    sink.text("--- Done ---");
    sink.text("Conversion succeeded!");
    sink.text(format!("'{archive_name}' has been created."));

    // The archive stays usable for installation even if this step fails.
    match extract_universal_apk(&request.output_path) {
        Ok(universal) => {
            sink.text(format!("Universal APK extracted: '{}'", display_name(&universal)));
        }
        Err(ExtractError::MissingEntry(entry)) => {
            let err = AppError::extraction(format!("'{entry}' missing from {archive_name}"), trace_id);
            warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "extraction skipped");
            sink.text(format!(
                "'{entry}' was not found in '{archive_name}'. bundletool only writes it with --mode=universal."
            ));
        }
        Err(other) => {
            let err = AppError::extraction(other.to_string(), trace_id);
            warn!(trace_id = %trace_id, code = %err.code, error = %err.error, "extraction failed");
            sink.text(format!("Failed to extract {UNIVERSAL_ENTRY}: {other}"));
        }
    }
    sink.text("You can now install it to the emulator.");

    Ok(TaskOutcome::Succeeded {
        artifact: Some(request.output_path.clone()),
    })
}
