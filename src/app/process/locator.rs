use std::path::{Path, PathBuf};

pub const ADB_PROGRAM: &str = "adb";

/// Looks `adb` up on the host search path.
pub fn locate_adb() -> Option<PathBuf> {
    locate_program(ADB_PROGRAM)
}

pub fn locate_program(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Short name for log lines; falls back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
