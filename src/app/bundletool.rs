use std::path::{Path, PathBuf};

use crate::app::config::{SigningConfig, ToolConfig};

pub const ARCHIVE_EXTENSION: &str = "apks";
pub const UNIVERSAL_ENTRY: &str = "universal.apk";

/// `app.aab` -> `app.apks`. The extension is replaced, never appended.
pub fn archive_output_path(bundle: &Path) -> PathBuf {
    bundle.with_extension(ARCHIVE_EXTENSION)
}

/// `app.apks` -> `app-universal.apk`, next to the archive.
pub fn universal_apk_path(archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    archive.with_file_name(format!("{stem}-universal.apk"))
}

pub fn signing_args(signing: &SigningConfig) -> Vec<String> {
    vec![
        format!("--ks={}", signing.keystore.display()),
        format!("--ks-key-alias={}", signing.key_alias),
        format!("--ks-pass=pass:{}", signing.store_pass),
        format!("--key-pass=pass:{}", signing.key_pass),
    ]
}

/// Full argument list for the launcher, `-jar <jar>` included.
pub fn build_apks_args(
    tools: &ToolConfig,
    bundle: &Path,
    output: &Path,
    signing: Option<&SigningConfig>,
) -> Vec<String> {
    let mut args = tools.launcher_args.clone();
    args.push("build-apks".to_string());
    args.push(format!("--bundle={}", bundle.display()));
    args.push(format!("--output={}", output.display()));
    args.push("--mode=universal".to_string());
    args.push("--overwrite".to_string());
    if let Some(signing) = signing {
        args.extend(signing_args(signing));
    }
    args
}

pub fn install_apks_args(tools: &ToolConfig, archive: &Path, adb: &Path, device_id: &str) -> Vec<String> {
    let mut args = tools.launcher_args.clone();
    args.push("install-apks".to_string());
    args.push(format!("--apks={}", archive.display()));
    args.push(format!("--adb={}", adb.display()));
    args.push(format!("--device-id={device_id}"));
    args
}

pub fn connect_args(device_id: &str) -> Vec<String> {
    vec!["connect".to_string(), device_id.to_string()]
}
