use serde::Serialize;
use std::fmt;

pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_LAUNCH: &str = "ERR_LAUNCH";
pub const ERR_PROCESS: &str = "ERR_PROCESS";
pub const ERR_PROTOCOL: &str = "ERR_PROTOCOL";
pub const ERR_EXTRACTION: &str = "ERR_EXTRACTION";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    /// Bad user input, rejected before any task starts.
    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    /// An external executable could not be found or started.
    pub fn launch(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_LAUNCH, message, trace_id)
    }

    pub fn process(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_PROCESS, message, trace_id)
    }

    pub fn protocol(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_PROTOCOL, message, trace_id)
    }

    pub fn extraction(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_EXTRACTION, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }

    pub fn is_validation(&self) -> bool {
        self.code == ERR_VALIDATION
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
