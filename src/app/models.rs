use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::app::config::{device_id, SigningConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Conversion,
    Installation,
}

impl TaskKind {
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Conversion => "conversion",
            TaskKind::Installation => "installation",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded { artifact: Option<PathBuf> },
    Failed,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }
}

/// One item travelling from a worker to the UI side.
///
/// Tool output is always `Text`, even when a line looks like a status marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Text(String),
    TaskFinished { task: TaskKind, outcome: TaskOutcome },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Idle,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub trace_id: String,
    pub bundle_path: PathBuf,
    pub output_path: PathBuf,
    pub signing: Option<SigningConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub trace_id: String,
    pub artifact_path: PathBuf,
    pub port: String,
}

impl InstallRequest {
    pub fn device_id(&self) -> String {
        device_id(&self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskConfiguration {
    Conversion(ConversionRequest),
    Installation(InstallRequest),
}

impl TaskConfiguration {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskConfiguration::Conversion(_) => TaskKind::Conversion,
            TaskConfiguration::Installation(_) => TaskKind::Installation,
        }
    }

    pub fn trace_id(&self) -> &str {
        match self {
            TaskConfiguration::Conversion(request) => &request.trace_id,
            TaskConfiguration::Installation(request) => &request.trace_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewState {
    pub conversion: TaskStatus,
    pub installation: TaskStatus,
    pub convert_label: String,
    pub install_label: String,
    pub convert_enabled: bool,
    pub install_enabled: bool,
    pub select_bundle_enabled: bool,
    pub select_archive_enabled: bool,
    pub options_enabled: bool,
    pub reveal_enabled: bool,
    pub progress_visible: bool,
    pub bundle_path: Option<String>,
    pub archive_path: Option<String>,
    pub last_artifact: Option<String>,
    pub port: String,
    pub signing_enabled: bool,
    pub drain_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogCursor {
    pub generation: u64,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogDelta {
    pub cursor: LogCursor,
    pub reset: bool,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrainUpdate {
    pub drained: usize,
    pub log: LogDelta,
    pub view: ViewState,
}
