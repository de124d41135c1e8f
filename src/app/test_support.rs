use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use zip::write::FileOptions;

use crate::app::config::{ToolConfig, BUNDLETOOL_JAR, KEYSTORE_FILE};
use crate::app::models::LogEntry;
use crate::app::sink::LogReceiver;

/// Tool directory with a placeholder jar and keystore, launched through `sh <script>`
/// instead of `java -jar`. Running the script through `sh` avoids exec'ing a file
/// that was just written, which can fail with ETXTBSY under parallel tests.
pub fn fake_tools(dir: &Path, script: &str) -> ToolConfig {
    std::fs::write(dir.join(BUNDLETOOL_JAR), b"jar").expect("jar");
    std::fs::write(dir.join(KEYSTORE_FILE), b"keystore").expect("keystore");
    let script_path = dir.join("fake-bundletool.sh");
    std::fs::write(&script_path, script).expect("script");
    ToolConfig::with_install_dir(dir).with_launcher(
        "sh",
        vec![script_path.to_string_lossy().to_string()],
    )
}

/// Prints every argument on its own line, prefixed with `arg:`.
pub const ECHO_ARGS_SCRIPT: &str = "for arg in \"$@\"; do echo \"arg:$arg\"; done\necho 'progress on stderr' >&2\n";

/// Fails unless `--bundle=` / `--apks=` name files that exist from the tool's own
/// working directory. A conversion copies `prepared.apks` from that directory to `--output=`.
pub const PATH_CHECK_SCRIPT: &str = r#"for arg in "$@"; do
  case "$arg" in
    --bundle=*) bundle="${arg#--bundle=}" ;;
    --output=*) output="${arg#--output=}" ;;
    --apks=*) apks="${arg#--apks=}" ;;
  esac
done
if [ -n "$bundle" ]; then
  [ -f "$bundle" ] || { echo "no such bundle $bundle in $(pwd)" >&2; exit 1; }
  cp prepared.apks "$output" || exit 1
  echo "wrote $output"
fi
if [ -n "$apks" ]; then
  [ -f "$apks" ] || { echo "no such archive $apks in $(pwd)" >&2; exit 1; }
  echo "installed $apks"
fi
"#;

/// `path` spelled relative to the current directory, climbing with `..` to the root.
#[cfg(unix)]
pub fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().expect("cwd");
    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.join(path.strip_prefix("/").expect("absolute path"))
}

pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("archive");
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in entries {
        zip.start_file(*name, FileOptions::<()>::default()).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap();
}

pub fn write_bundle(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"bundle").expect("bundle");
    path
}

pub fn text_lines(entries: &[LogEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            LogEntry::Text(line) => Some(line.clone()),
            LogEntry::TaskFinished { .. } => None,
        })
        .collect()
}

pub fn contains_line(lines: &[String], needle: &str) -> bool {
    lines.iter().any(|line| line.contains(needle))
}

/// Drains until `done` accepts the collected entries or the deadline passes.
pub fn drain_until(
    receiver: &LogReceiver,
    timeout: Duration,
    done: impl Fn(&[LogEntry]) -> bool,
) -> Vec<LogEntry> {
    let deadline = Instant::now() + timeout;
    let mut entries = Vec::new();
    loop {
        entries.extend(receiver.drain());
        if done(&entries) || Instant::now() >= deadline {
            return entries;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

pub fn has_finished(entries: &[LogEntry]) -> bool {
    entries
        .iter()
        .any(|entry| matches!(entry, LogEntry::TaskFinished { .. }))
}
