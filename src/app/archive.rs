use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::app::bundletool::{universal_apk_path, UNIVERSAL_ENTRY};

#[derive(Debug)]
pub enum ExtractError {
    MissingEntry(String),
    Archive(String),
    Io(String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::MissingEntry(name) => write!(f, "archive has no '{name}' entry"),
            ExtractError::Archive(message) => write!(f, "invalid archive: {message}"),
            ExtractError::Io(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Copies `universal.apk` out of an `.apks` archive into `<stem>-universal.apk`.
///
/// The copy goes through a temp file in the target directory, so a failed
/// extraction never leaves a truncated apk behind.
pub fn extract_universal_apk(archive_path: &Path) -> Result<PathBuf, ExtractError> {
    let file = File::open(archive_path)
        .map_err(|err| ExtractError::Io(format!("Failed to open archive: {err}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| ExtractError::Archive(err.to_string()))?;
    let mut entry = match archive.by_name(UNIVERSAL_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ExtractError::MissingEntry(UNIVERSAL_ENTRY.to_string()))
        }
        Err(err) => return Err(ExtractError::Archive(err.to_string())),
    };

    let target = universal_apk_path(archive_path);
    let target_dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staging = NamedTempFile::new_in(target_dir)
        .map_err(|err| ExtractError::Io(format!("Failed to create temp file: {err}")))?;
    io::copy(&mut entry, staging.as_file_mut())
        .map_err(|err| ExtractError::Io(format!("Failed to extract {UNIVERSAL_ENTRY}: {err}")))?;
    staging
        .persist(&target)
        .map_err(|err| ExtractError::Io(format!("Failed to write {}: {}", target.display(), err.error)))?;

    Ok(target)
}
