use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::app::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

fn build_command(program: &str, args: &[String], cwd: Option<&Path>) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    hide_console_window(&mut command);
    command
}

#[cfg(windows)]
fn hide_console_window(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_command: &mut Command) {}

fn spawn_child(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    trace_id: &str,
) -> Result<Child, AppError> {
    debug!(trace_id = %trace_id, program = %program, args = ?args, "spawning process");
    build_command(program, args, cwd)
        .spawn()
        .map_err(|err| AppError::launch(format!("Failed to start {program}: {err}"), trace_id))
}

fn drain_pipe<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

/// Runs a command to completion and captures both streams whole.
///
/// There is no timeout: a child that never exits blocks the caller.
pub fn run_command(program: &str, args: &[String], trace_id: &str) -> Result<CommandOutput, AppError> {
    let mut child = spawn_child(program, args, None, trace_id)?;

    // Drain stdout/stderr in parallel; a chatty child blocks once a pipe buffer fills.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain_pipe(stdout);
    let stderr_handle = drain_pipe(stderr);

    let status = child
        .wait()
        .map_err(|err| AppError::system(format!("Failed to wait for {program}: {err}"), trace_id))?;

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code: status.code(),
    })
}

/// A running child whose stdout is consumed line by line while it runs.
pub struct StreamingCommand {
    program: String,
    trace_id: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_handle: Option<JoinHandle<Vec<u8>>>,
}

impl StreamingCommand {
    pub fn spawn(
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        trace_id: &str,
    ) -> Result<Self, AppError> {
        let mut child = spawn_child(program, args, cwd, trace_id)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

        Ok(Self {
            program: program.to_string(),
            trace_id: trace_id.to_string(),
            child,
            stdout: BufReader::new(stdout),
            stderr_handle: Some(drain_pipe(stderr)),
        })
    }

    /// Stdout lines as they arrive. The sequence ends at EOF and does not restart.
    pub fn lines(&mut self) -> OutputLines<'_> {
        OutputLines {
            reader: &mut self.stdout,
            trace_id: &self.trace_id,
            done: false,
        }
    }

    /// Waits for exit and returns the status, the buffered stderr and any unread stdout.
    pub fn finish(mut self) -> Result<CommandOutput, AppError> {
        let mut rest = Vec::new();
        if let Err(err) = self.stdout.read_to_end(&mut rest) {
            warn!(trace_id = %self.trace_id, error = %err, "failed to read remaining stdout");
        }
        let status = self.child.wait().map_err(|err| {
            AppError::system(format!("Failed to wait for {}: {err}", self.program), &self.trace_id)
        })?;
        let stderr_bytes = self
            .stderr_handle
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&rest).to_string(),
            stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
            exit_code: status.code(),
        })
    }
}

pub struct OutputLines<'a> {
    reader: &'a mut BufReader<ChildStdout>,
    trace_id: &'a str,
    done: bool,
}

impl Iterator for OutputLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let mut buffer = Vec::new();
        match self.reader.read_until(b'\n', &mut buffer) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                while matches!(buffer.last(), Some(b'\n') | Some(b'\r')) {
                    buffer.pop();
                }
                Some(String::from_utf8_lossy(&buffer).to_string())
            }
            Err(err) => {
                warn!(trace_id = %self.trace_id, error = %err, "failed to read stdout");
                self.done = true;
                None
            }
        }
    }
}
