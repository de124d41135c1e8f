use std::path::{Path, PathBuf};

use crate::app::error::AppError;

pub const BUNDLETOOL_JAR: &str = "bundletool-all-1.13.2.jar";
pub const KEYSTORE_FILE: &str = "key";
pub const KEY_ALIAS: &str = "key";
pub const STORE_PASS: &str = "00000000";
pub const KEY_PASS: &str = "00000000";
pub const JAVA_PROGRAM: &str = "java";
pub const DEVICE_HOST: &str = "127.0.0.1";
pub const DEFAULT_ADB_PORT: &str = "5555";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    pub keystore: PathBuf,
    pub key_alias: String,
    pub store_pass: String,
    pub key_pass: String,
}

/// Locations of the external tools, resolved once at startup.
///
/// Everything the packaging tool needs lives next to the executable, so a
/// launch from an unrelated working directory still finds the jar and keystore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub install_dir: PathBuf,
    pub launcher_program: String,
    pub launcher_args: Vec<String>,
    pub bundletool_jar: PathBuf,
    pub signing: SigningConfig,
    pub default_port: String,
}

impl ToolConfig {
    pub fn resolve(trace_id: &str) -> Result<Self, AppError> {
        Ok(Self::with_install_dir(install_dir(trace_id)?))
    }

    pub fn with_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        let bundletool_jar = install_dir.join(BUNDLETOOL_JAR);
        Self {
            launcher_program: JAVA_PROGRAM.to_string(),
            launcher_args: vec![
                "-jar".to_string(),
                bundletool_jar.to_string_lossy().to_string(),
            ],
            bundletool_jar,
            signing: SigningConfig {
                keystore: install_dir.join(KEYSTORE_FILE),
                key_alias: KEY_ALIAS.to_string(),
                store_pass: STORE_PASS.to_string(),
                key_pass: KEY_PASS.to_string(),
            },
            default_port: DEFAULT_ADB_PORT.to_string(),
            install_dir,
        }
    }

    /// Replaces `java -jar <jar>` with another launcher, keeping the jar check in place.
    pub fn with_launcher(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.launcher_program = program.into();
        self.launcher_args = args;
        self
    }

    /// Working directory for packaging tool runs; `None` when resolved relative to nothing.
    pub fn working_dir(&self) -> Option<&Path> {
        if self.install_dir.as_os_str().is_empty() {
            None
        } else {
            Some(self.install_dir.as_path())
        }
    }

    pub fn missing_for_conversion(&self, signing: bool) -> Vec<PathBuf> {
        let mut required = vec![self.bundletool_jar.clone()];
        if signing {
            required.push(self.signing.keystore.clone());
        }
        required.into_iter().filter(|path| !path.is_file()).collect()
    }
}

pub fn install_dir(trace_id: &str) -> Result<PathBuf, AppError> {
    let exe = std::env::current_exe()
        .map_err(|err| AppError::system(format!("Failed to locate executable: {err}"), trace_id))?;
    let exe = exe.canonicalize().unwrap_or(exe);
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| AppError::system("Executable has no parent directory", trace_id))?;
    utf8_dir(dir, trace_id)
}

/// Tool paths are passed to the launcher as text, so the directory must be UTF-8.
fn utf8_dir(dir: PathBuf, trace_id: &str) -> Result<PathBuf, AppError> {
    if dir.to_str().is_none() {
        return Err(AppError::system(
            format!("Install directory is not valid UTF-8: {}", dir.display()),
            trace_id,
        ));
    }
    Ok(dir)
}

pub fn device_id(port: &str) -> String {
    format!("{DEVICE_HOST}:{}", port.trim())
}
