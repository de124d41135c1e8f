use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::bundletool::archive_output_path;
use crate::app::config::{device_id, ToolConfig};
use crate::app::error::AppError;
use crate::app::models::{
    ConversionRequest, InstallRequest, LogCursor, LogDelta, LogEntry, TaskConfiguration,
    TaskKind, TaskOutcome, TaskStatus, ViewState,
};
use crate::app::sink::{LogReceiver, BANNER_RULE};

/// How often the UI side drains the log sink.
pub const DRAIN_INTERVAL_MS: u64 = 100;

const CONVERT_LABEL: &str = "Start conversion";
const CONVERTING_LABEL: &str = "Converting...";
const INSTALL_LABEL: &str = "Install to emulator";
const INSTALLING_LABEL: &str = "Installing...";

/// Lines kept in the log view. Older lines are dropped in batches.
pub const MAX_LOG_LINES: usize = 5_000;
const LOG_TRIM_BATCH: usize = 500;

/// Form fields, task status and the log view.
///
/// Only the UI side touches this; workers report through the log sink and the
/// results land here when [`UiController::drain`] runs.
#[derive(Debug)]
pub struct UiController {
    bundle_path: Option<PathBuf>,
    archive_path: Option<PathBuf>,
    last_artifact: Option<PathBuf>,
    port: String,
    signing_enabled: bool,
    conversion: TaskStatus,
    installation: TaskStatus,
    log: Vec<String>,
    log_generation: u64,
}

impl UiController {
    pub fn new(default_port: &str) -> Self {
        Self {
            bundle_path: None,
            archive_path: None,
            last_artifact: None,
            port: default_port.to_string(),
            signing_enabled: true,
            conversion: TaskStatus::Idle,
            installation: TaskStatus::Idle,
            log: Vec::new(),
            log_generation: 0,
        }
    }

    pub fn status(&self, task: TaskKind) -> TaskStatus {
        match task {
            TaskKind::Conversion => self.conversion,
            TaskKind::Installation => self.installation,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.conversion == TaskStatus::Busy || self.installation == TaskStatus::Busy
    }

    pub fn last_artifact(&self) -> Option<&Path> {
        self.last_artifact.as_deref()
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.push_line(line.into());
    }

    pub fn select_bundle(&mut self, path: PathBuf, trace_id: &str) -> Result<(), AppError> {
        self.ensure_idle(trace_id)?;
        let path = self.resolve_selection(path, trace_id)?;
        self.note(format!("Selected AAB file: {}", path.display()));
        self.bundle_path = Some(path);
        self.archive_path = None;
        self.last_artifact = None;
        Ok(())
    }

    pub fn select_archive(&mut self, path: PathBuf, trace_id: &str) -> Result<(), AppError> {
        self.ensure_idle(trace_id)?;
        let path = self.resolve_selection(path, trace_id)?;
        self.note(format!("Selected APKS file: {}", path.display()));
        self.archive_path = Some(path.clone());
        self.last_artifact = Some(path);
        Ok(())
    }

    pub fn set_port(&mut self, port: &str, trace_id: &str) -> Result<(), AppError> {
        self.ensure_idle(trace_id)?;
        self.port = port.to_string();
        Ok(())
    }

    pub fn set_signing(&mut self, enabled: bool, trace_id: &str) -> Result<(), AppError> {
        self.ensure_idle(trace_id)?;
        self.signing_enabled = enabled;
        Ok(())
    }

    /// Validates the conversion form and moves conversion to `Busy`.
    pub fn begin_conversion(
        &mut self,
        tools: &ToolConfig,
        trace_id: &str,
    ) -> Result<TaskConfiguration, AppError> {
        self.ensure_idle(trace_id)?;
        let Some(bundle_path) = self.bundle_path.clone() else {
            return Err(self.reject(AppError::validation("Select an AAB file first!", trace_id)));
        };
        if !bundle_path.is_file() {
            return Err(self.reject(AppError::validation(
                format!("AAB file not found: {}", bundle_path.display()),
                trace_id,
            )));
        }
        let missing = tools.missing_for_conversion(self.signing_enabled);
        if !missing.is_empty() {
            let names = missing
                .iter()
                .map(|path| format!("'{}'", path.display()))
                .collect::<Vec<_>>()
                .join(" or ");
            return Err(self.reject(AppError::validation(
                format!("Cannot find {names}."),
                trace_id,
            )));
        }

        self.clear_log();
        self.last_artifact = None;
        self.conversion = TaskStatus::Busy;
        info!(trace_id = %trace_id, bundle = %bundle_path.display(), "conversion requested");

        Ok(TaskConfiguration::Conversion(ConversionRequest {
            trace_id: trace_id.to_string(),
            output_path: archive_output_path(&bundle_path),
            bundle_path,
            signing: self.signing_enabled.then(|| tools.signing.clone()),
        }))
    }

    /// Validates the installation form and moves installation to `Busy`.
    pub fn begin_installation(&mut self, trace_id: &str) -> Result<TaskConfiguration, AppError> {
        self.ensure_idle(trace_id)?;
        let Some(artifact_path) = self.last_artifact.clone() else {
            return Err(self.reject(AppError::validation(
                "Convert or select an APKS file first.",
                trace_id,
            )));
        };
        let port = self.port.trim().to_string();
        if !is_valid_port(&port) {
            return Err(self.reject(AppError::validation(
                format!("Port '{port}' is not a valid number."),
                trace_id,
            )));
        }

        self.installation = TaskStatus::Busy;
        self.note("");
        self.note(BANNER_RULE);
        self.note(format!("Installing to emulator {}", device_id(&port)));
        self.note(BANNER_RULE);
        self.note("");
        info!(trace_id = %trace_id, port = %port, "installation requested");

        Ok(TaskConfiguration::Installation(InstallRequest {
            trace_id: trace_id.to_string(),
            artifact_path,
            port,
        }))
    }

    pub fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Text(line) => self.push_line(line),
            LogEntry::TaskFinished { task, outcome } => {
                match task {
                    TaskKind::Conversion => self.conversion = TaskStatus::Idle,
                    TaskKind::Installation => self.installation = TaskStatus::Idle,
                }
                if let TaskOutcome::Succeeded {
                    artifact: Some(artifact),
                } = outcome
                {
                    self.archive_path = Some(artifact.clone());
                    self.last_artifact = Some(artifact);
                }
            }
        }
    }

    /// Applies everything queued right now; never waits for the worker.
    pub fn drain(&mut self, receiver: &LogReceiver) -> usize {
        let entries = receiver.drain();
        let count = entries.len();
        for entry in entries {
            self.apply(entry);
        }
        count
    }

    pub fn log_since(&self, cursor: LogCursor) -> LogDelta {
        let current = LogCursor {
            generation: self.log_generation,
            offset: self.log.len(),
        };
        if cursor.generation != self.log_generation || cursor.offset > self.log.len() {
            return LogDelta {
                cursor: current,
                reset: true,
                lines: self.log.clone(),
            };
        }
        LogDelta {
            cursor: current,
            reset: false,
            lines: self.log[cursor.offset..].to_vec(),
        }
    }

    pub fn view(&self) -> ViewState {
        let busy = self.is_busy();
        let has_artifact = self.last_artifact.is_some();
        ViewState {
            conversion: self.conversion,
            installation: self.installation,
            convert_label: match self.conversion {
                TaskStatus::Busy => CONVERTING_LABEL,
                TaskStatus::Idle => CONVERT_LABEL,
            }
            .to_string(),
            install_label: match self.installation {
                TaskStatus::Busy => INSTALLING_LABEL,
                TaskStatus::Idle => INSTALL_LABEL,
            }
            .to_string(),
            convert_enabled: !busy,
            install_enabled: !busy && has_artifact,
            select_bundle_enabled: !busy,
            select_archive_enabled: !busy,
            options_enabled: !busy,
            reveal_enabled: !busy && has_artifact,
            progress_visible: busy,
            bundle_path: self.bundle_path.as_ref().map(|path| path.display().to_string()),
            archive_path: self.archive_path.as_ref().map(|path| path.display().to_string()),
            last_artifact: self.last_artifact.as_ref().map(|path| path.display().to_string()),
            port: self.port.clone(),
            signing_enabled: self.signing_enabled,
            drain_interval_ms: DRAIN_INTERVAL_MS,
        }
    }

    fn ensure_idle(&mut self, trace_id: &str) -> Result<(), AppError> {
        if self.is_busy() {
            return Err(self.reject(AppError::validation(
                "A task is already running. Wait for it to finish.",
                trace_id,
            )));
        }
        Ok(())
    }

    /// Selections are stored absolute: the packaging tool runs from the install
    /// directory, not from wherever this process was launched.
    fn resolve_selection(&mut self, path: PathBuf, trace_id: &str) -> Result<PathBuf, AppError> {
        if path.to_str().is_none() {
            return Err(self.reject(AppError::validation(
                format!("Path is not valid UTF-8: {}", path.display()),
                trace_id,
            )));
        }
        Ok(std::path::absolute(&path).unwrap_or(path))
    }

    fn push_line(&mut self, line: String) {
        self.log.push(line);
        if self.log.len() > MAX_LOG_LINES {
            self.log.drain(..LOG_TRIM_BATCH);
            self.log_generation += 1;
        }
    }

    fn reject(&mut self, err: AppError) -> AppError {
        self.note(format!("Error: {}", err.error));
        err
    }

    fn clear_log(&mut self) {
        self.log.clear();
        self.log_generation += 1;
    }
}

pub fn is_valid_port(port: &str) -> bool {
    !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::ERR_VALIDATION;
    use crate::app::sink::log_channel;
    use crate::app::test_support::{fake_tools, write_bundle};
    use tempfile::TempDir;

    fn ready_conversion(tmp: &TempDir) -> (UiController, ToolConfig) {
        let tools = fake_tools(tmp.path(), "exit 0\n");
        let mut controller = UiController::new("5555");
        controller
            .select_bundle(write_bundle(tmp.path(), "app.aab"), "t")
            .expect("select");
        (controller, tools)
    }

    fn finish(controller: &mut UiController, task: TaskKind, outcome: TaskOutcome) {
        controller.apply(LogEntry::TaskFinished { task, outcome });
    }

    #[test]
    fn starts_idle_with_install_unavailable() {
        let controller = UiController::new("5555");
        let view = controller.view();
        assert_eq!(view.conversion, TaskStatus::Idle);
        assert_eq!(view.installation, TaskStatus::Idle);
        assert!(view.convert_enabled);
        assert!(!view.install_enabled);
        assert!(!view.progress_visible);
        assert_eq!(view.port, "5555");
        assert!(view.signing_enabled);
        assert_eq!(view.drain_interval_ms, 100);
    }

    #[test]
    fn conversion_requires_a_bundle() {
        let tmp = TempDir::new().expect("tmp");
        let tools = fake_tools(tmp.path(), "exit 0\n");
        let mut controller = UiController::new("5555");

        let err = controller.begin_conversion(&tools, "t").unwrap_err();
        assert_eq!(err.code, ERR_VALIDATION);
        assert_eq!(controller.status(TaskKind::Conversion), TaskStatus::Idle);
        assert_eq!(controller.log_lines().last().unwrap(), "Error: Select an AAB file first!");
    }

    #[test]
    fn conversion_requires_existing_bundle_and_tools() {
        let tmp = TempDir::new().expect("tmp");
        let mut controller = UiController::new("5555");
        controller
            .select_bundle(tmp.path().join("gone.aab"), "t")
            .expect("select");
        let tools = fake_tools(tmp.path(), "exit 0\n");
        let err = controller.begin_conversion(&tools, "t").unwrap_err();
        assert!(err.error.contains("AAB file not found"));

        let bare = TempDir::new().expect("bare");
        controller
            .select_bundle(write_bundle(tmp.path(), "app.aab"), "t")
            .expect("select");
        let err = controller
            .begin_conversion(&ToolConfig::with_install_dir(bare.path()), "t")
            .unwrap_err();
        assert!(err.error.contains("bundletool-all-1.13.2.jar"));
        assert!(err.error.contains("key"));
        assert!(!controller.is_busy());
    }

    #[test]
    fn unsigned_conversion_does_not_need_keystore() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);
        std::fs::remove_file(&tools.signing.keystore).expect("remove keystore");
        controller.set_signing(false, "t").expect("signing");

        let config = controller.begin_conversion(&tools, "t").expect("begin");
        let TaskConfiguration::Conversion(request) = config else {
            panic!("expected conversion");
        };
        assert_eq!(request.signing, None);
    }

    #[test]
    fn begin_conversion_builds_request_and_goes_busy() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);

        let config = controller.begin_conversion(&tools, "trace-1").expect("begin");
        let TaskConfiguration::Conversion(request) = config else {
            panic!("expected conversion");
        };
        assert_eq!(request.trace_id, "trace-1");
        assert_eq!(request.output_path, tmp.path().join("app.apks"));
        assert_eq!(request.signing, Some(tools.signing.clone()));

        let view = controller.view();
        assert_eq!(view.conversion, TaskStatus::Busy);
        assert_eq!(view.convert_label, "Converting...");
        assert!(view.progress_visible);
        assert!(!view.convert_enabled);
        assert!(!view.install_enabled);
        assert!(!view.select_bundle_enabled);
        assert!(!view.select_archive_enabled);
        assert!(!view.options_enabled);
        assert!(controller.log_lines().is_empty());
    }

    #[test]
    fn second_task_is_refused_while_busy() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);
        controller.begin_conversion(&tools, "t").expect("begin");

        let err = controller.begin_conversion(&tools, "t").unwrap_err();
        assert!(err.error.contains("already running"));
        let err = controller.begin_installation("t").unwrap_err();
        assert!(err.error.contains("already running"));
        assert!(controller.select_bundle(tmp.path().join("x.aab"), "t").is_err());
        assert!(controller.set_port("1", "t").is_err());
        assert_eq!(controller.status(TaskKind::Installation), TaskStatus::Idle);
    }

    #[test]
    fn successful_conversion_enables_install() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);
        controller.begin_conversion(&tools, "t").expect("begin");

        let artifact = tmp.path().join("app.apks");
        controller.apply(LogEntry::Text("building".to_string()));
        finish(
            &mut controller,
            TaskKind::Conversion,
            TaskOutcome::Succeeded {
                artifact: Some(artifact.clone()),
            },
        );

        let view = controller.view();
        assert_eq!(view.conversion, TaskStatus::Idle);
        assert_eq!(view.convert_label, "Start conversion");
        assert!(view.install_enabled);
        assert!(view.convert_enabled);
        assert!(!view.progress_visible);
        assert_eq!(controller.last_artifact(), Some(artifact.as_path()));
        assert_eq!(view.archive_path, Some(artifact.display().to_string()));
        assert_eq!(controller.log_lines(), &["building".to_string()]);
    }

    #[test]
    fn failed_conversion_leaves_install_unavailable() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);
        controller
            .select_archive(tmp.path().join("old.apks"), "t")
            .expect("archive");
        controller.begin_conversion(&tools, "t").expect("begin");
        finish(&mut controller, TaskKind::Conversion, TaskOutcome::Failed);

        let view = controller.view();
        assert_eq!(view.conversion, TaskStatus::Idle);
        assert!(!view.install_enabled);
        assert!(view.convert_enabled);
    }

    #[test]
    fn install_availability_tracks_last_artifact_after_install() {
        let mut controller = UiController::new("5555");
        controller
            .select_archive(PathBuf::from("/tmp/app.apks"), "t")
            .expect("archive");
        controller.begin_installation("t").expect("begin");
        assert_eq!(controller.view().install_label, "Installing...");

        finish(&mut controller, TaskKind::Installation, TaskOutcome::Failed);
        let view = controller.view();
        assert_eq!(view.installation, TaskStatus::Idle);
        assert_eq!(view.install_label, "Install to emulator");
        assert!(view.install_enabled);
    }

    #[test]
    fn selecting_a_bundle_forgets_the_artifact() {
        let mut controller = UiController::new("5555");
        controller
            .select_archive(PathBuf::from("/tmp/app.apks"), "t")
            .expect("archive");
        assert!(controller.view().install_enabled);

        controller
            .select_bundle(PathBuf::from("/tmp/other.aab"), "t")
            .expect("bundle");
        let view = controller.view();
        assert!(!view.install_enabled);
        assert_eq!(view.archive_path, None);
        assert!(controller
            .log_lines()
            .contains(&"Selected AAB file: /tmp/other.aab".to_string()));
    }

    #[test]
    fn non_numeric_port_is_rejected_before_start() {
        let mut controller = UiController::new("5555");
        controller
            .select_archive(PathBuf::from("/tmp/app.apks"), "t")
            .expect("archive");
        controller.set_port("55ab", "t").expect("port");

        let err = controller.begin_installation("t").unwrap_err();
        assert_eq!(err.code, ERR_VALIDATION);
        assert_eq!(err.error, "Port '55ab' is not a valid number.");
        assert_eq!(controller.status(TaskKind::Installation), TaskStatus::Idle);
        assert!(!controller.is_busy());
    }

    #[test]
    fn installation_requires_an_artifact() {
        let mut controller = UiController::new("5555");
        let err = controller.begin_installation("t").unwrap_err();
        assert!(err.error.contains("Convert or select an APKS file first"));
    }

    #[test]
    fn installation_request_uses_trimmed_port() {
        let mut controller = UiController::new("5555");
        controller
            .select_archive(PathBuf::from("/tmp/app.apks"), "t")
            .expect("archive");
        controller.set_port(" 62001 ", "t").expect("port");

        let config = controller.begin_installation("t").expect("begin");
        let TaskConfiguration::Installation(request) = config else {
            panic!("expected installation");
        };
        assert_eq!(request.port, "62001");
        assert_eq!(request.device_id(), "127.0.0.1:62001");
        assert!(controller
            .log_lines()
            .contains(&"Installing to emulator 127.0.0.1:62001".to_string()));
    }

    #[test]
    fn port_validation() {
        assert!(is_valid_port("5555"));
        assert!(!is_valid_port(""));
        assert!(!is_valid_port("55ab"));
        assert!(!is_valid_port("-1"));
        assert!(!is_valid_port("5 5"));
    }

    #[test]
    fn drain_applies_entries_in_order_and_restores_idle() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);
        controller.begin_conversion(&tools, "t").expect("begin");

        let (tx, rx) = log_channel();
        tx.text("first");
        tx.text("second");
        assert_eq!(controller.drain(&rx), 2);
        assert!(controller.is_busy());

        tx.finished(
            TaskKind::Conversion,
            TaskOutcome::Succeeded {
                artifact: Some(tmp.path().join("app.apks")),
            },
        );
        tx.text("late line");
        assert_eq!(controller.drain(&rx), 2);
        assert!(!controller.is_busy());
        assert_eq!(
            controller.log_lines(),
            &["first".to_string(), "second".to_string(), "late line".to_string()]
        );
        assert_eq!(controller.drain(&rx), 0);
    }

    #[test]
    fn log_since_returns_incremental_lines_and_resets_after_clear() {
        let tmp = TempDir::new().expect("tmp");
        let (mut controller, tools) = ready_conversion(&tmp);
        let first = controller.log_since(LogCursor::default());
        assert!(!first.reset);
        assert_eq!(first.lines.len(), 1);

        controller.note("more");
        let second = controller.log_since(first.cursor);
        assert!(!second.reset);
        assert_eq!(second.lines, vec!["more".to_string()]);

        controller.begin_conversion(&tools, "t").expect("begin");
        controller.note("fresh");
        let third = controller.log_since(second.cursor);
        assert!(third.reset);
        assert_eq!(third.lines, vec!["fresh".to_string()]);
        assert_eq!(third.cursor.generation, 1);
    }

    #[test]
    fn relative_selections_are_pinned_to_the_current_directory() {
        let cwd = std::env::current_dir().expect("cwd");
        let mut controller = UiController::new("5555");

        controller
            .select_bundle(PathBuf::from("app.aab"), "t")
            .expect("bundle");
        assert_eq!(
            controller.view().bundle_path,
            Some(cwd.join("app.aab").display().to_string())
        );

        controller
            .select_archive(PathBuf::from("out/app.apks"), "t")
            .expect("archive");
        assert_eq!(controller.last_artifact(), Some(cwd.join("out/app.apks").as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn relative_bundle_request_carries_absolute_paths() {
        use crate::app::test_support::relative_to_cwd;

        let tmp = TempDir::new().expect("tmp");
        let tools = fake_tools(tmp.path(), "exit 0\n");
        let bundle = write_bundle(tmp.path(), "app.aab");
        let mut controller = UiController::new("5555");
        controller
            .select_bundle(relative_to_cwd(&bundle), "t")
            .expect("bundle");

        let TaskConfiguration::Conversion(request) =
            controller.begin_conversion(&tools, "t").expect("begin")
        else {
            panic!("expected conversion");
        };
        assert!(request.bundle_path.is_absolute());
        assert!(request.output_path.is_absolute());
        assert_eq!(
            request.bundle_path.canonicalize().expect("bundle"),
            bundle.canonicalize().expect("bundle")
        );
        assert_eq!(request.output_path.file_name(), Some(std::ffi::OsStr::new("app.apks")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_selection_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut controller = UiController::new("5555");
        let path = PathBuf::from(OsStr::from_bytes(b"/tmp/app\xff.aab"));
        let err = controller.select_bundle(path.clone(), "t").unwrap_err();
        assert_eq!(err.code, ERR_VALIDATION);
        assert!(err.error.contains("not valid UTF-8"));
        assert_eq!(controller.view().bundle_path, None);

        let err = controller.select_archive(path, "t").unwrap_err();
        assert_eq!(err.code, ERR_VALIDATION);
        assert!(!controller.view().install_enabled);
    }

    #[test]
    fn log_is_capped_and_readers_are_reset() {
        let mut controller = UiController::new("5555");
        let start = controller.log_since(LogCursor::default());
        for index in 0..MAX_LOG_LINES {
            controller.note(format!("line {index}"));
        }
        assert_eq!(controller.log_lines().len(), MAX_LOG_LINES);

        controller.apply(LogEntry::Text("overflow".to_string()));
        let lines = controller.log_lines();
        assert_eq!(lines.len(), MAX_LOG_LINES + 1 - LOG_TRIM_BATCH);
        assert_eq!(lines[0], format!("line {LOG_TRIM_BATCH}"));
        assert_eq!(lines.last().map(String::as_str), Some("overflow"));

        let delta = controller.log_since(start.cursor);
        assert!(delta.reset);
        assert_eq!(delta.lines.len(), lines.len());
    }
}
