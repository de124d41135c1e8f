use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use aab_apks_tool_lib::app::config::ToolConfig;
use aab_apks_tool_lib::app::controller::DRAIN_INTERVAL_MS;
use aab_apks_tool_lib::app::error::AppError;
use aab_apks_tool_lib::app::logging::init_cli_logging;
use aab_apks_tool_lib::app::models::{LogCursor, TaskKind, TaskOutcome, TaskStatus};
use aab_apks_tool_lib::app::state::AppState;
use aab_apks_tool_lib::app::tasks::spawn_task;
use serde::Serialize;
use uuid::Uuid;

const USAGE: &str = "Usage: cargo run --bin smoke -- (--bundle PATH [--unsigned] | --apks PATH) [--install] [--port PORT] [--tools-dir DIR] [--json]\n";

#[derive(Debug, Clone)]
struct Args {
    bundle: Option<PathBuf>,
    apks: Option<PathBuf>,
    unsigned: bool,
    install: bool,
    port: Option<String>,
    tools_dir: Option<PathBuf>,
    json: bool,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    install_dir: String,
    artifact: Option<String>,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut bundle: Option<PathBuf> = None;
    let mut apks: Option<PathBuf> = None;
    let mut unsigned = false;
    let mut install = false;
    let mut port: Option<String> = None;
    let mut tools_dir: Option<PathBuf> = None;
    let mut json = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bundle" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--bundle requires a value".to_string())?;
                bundle = Some(PathBuf::from(value));
            }
            "--apks" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--apks requires a value".to_string())?;
                apks = Some(PathBuf::from(value));
            }
            "--unsigned" => {
                unsigned = true;
            }
            "--install" => {
                install = true;
            }
            "--port" => {
                port = Some(
                    it.next()
                        .ok_or_else(|| "--port requires a value".to_string())?,
                );
            }
            "--tools-dir" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--tools-dir requires a value".to_string())?;
                tools_dir = Some(PathBuf::from(value));
            }
            "--json" => {
                json = true;
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("Unknown arg: {other}\n{USAGE}")),
        }
    }

    if bundle.is_some() && apks.is_some() {
        return Err("--bundle and --apks are mutually exclusive".to_string());
    }
    if bundle.is_none() && apks.is_none() {
        return Err(USAGE.to_string());
    }
    if apks.is_some() && !install {
        return Err("--apks only makes sense with --install".to_string());
    }

    Ok(Args {
        bundle,
        apks,
        unsigned,
        install,
        port,
        tools_dir,
        json,
    })
}

/// Drives one task the way the window does: validate, spawn, drain on a timer.
fn run_task_check(
    state: &AppState,
    name: &'static str,
    task: TaskKind,
    trace_id: &str,
    echo: bool,
) -> SmokeCheck {
    let start = Instant::now();
    let fail = |err: AppError| SmokeCheck {
        name,
        status: "fail",
        duration_ms: start.elapsed().as_millis(),
        error_code: Some(err.code.clone()),
        error: Some(err.error),
    };

    let begun = match state.controller.lock() {
        Ok(mut controller) => match task {
            TaskKind::Conversion => controller.begin_conversion(&state.tools, trace_id),
            TaskKind::Installation => controller.begin_installation(trace_id),
        },
        Err(_) => Err(AppError::system("UI state locked", trace_id)),
    };
    let config = match begun {
        Ok(config) => config,
        Err(err) => return fail(err),
    };
    let handle = match spawn_task(config, state.tools.clone(), state.log_sender.clone()) {
        Ok(handle) => handle,
        Err(err) => return fail(err),
    };

    let mut cursor = LogCursor::default();
    loop {
        thread::sleep(Duration::from_millis(DRAIN_INTERVAL_MS));
        let (Ok(receiver), Ok(mut controller)) = (state.log_receiver.lock(), state.controller.lock())
        else {
            return fail(AppError::system("UI state locked", trace_id));
        };
        controller.drain(&receiver);
        let delta = controller.log_since(cursor);
        cursor = delta.cursor;
        if echo {
            for line in &delta.lines {
                println!("{line}");
            }
        }
        if controller.status(task) == TaskStatus::Idle {
            break;
        }
    }

    match handle.join().unwrap_or(TaskOutcome::Failed) {
        TaskOutcome::Succeeded { .. } => SmokeCheck {
            name,
            status: "pass",
            duration_ms: start.elapsed().as_millis(),
            error_code: None,
            error: None,
        },
        TaskOutcome::Failed => fail(AppError::process(format!("{} failed", task.label()), trace_id)),
    }
}

fn prepare(state: &AppState, args: &Args, trace_id: &str) -> Result<(), AppError> {
    let mut controller = state
        .controller
        .lock()
        .map_err(|_| AppError::system("UI state locked", trace_id))?;
    if let Some(bundle) = &args.bundle {
        controller.select_bundle(bundle.clone(), trace_id)?;
    }
    if let Some(apks) = &args.apks {
        controller.select_archive(apks.clone(), trace_id)?;
    }
    controller.set_signing(!args.unsigned, trace_id)?;
    if let Some(port) = &args.port {
        controller.set_port(port, trace_id)?;
    }
    Ok(())
}

fn main() {
    init_cli_logging();
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let trace_id = Uuid::new_v4().to_string();
    let tools = match &args.tools_dir {
        Some(dir) => ToolConfig::with_install_dir(dir.clone()),
        None => match ToolConfig::resolve(&trace_id) {
            Ok(tools) => tools,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        },
    };
    let install_dir = tools.install_dir.display().to_string();
    let state = AppState::new(tools);

    let mut checks: Vec<SmokeCheck> = Vec::new();
    let mut status = "pass";
    if let Err(err) = prepare(&state, &args, &trace_id) {
        checks.push(SmokeCheck {
            name: "prepare",
            status: "fail",
            duration_ms: 0,
            error_code: Some(err.code),
            error: Some(err.error),
        });
        status = "fail";
    }

    let echo = !args.json;
    if status == "pass" && args.bundle.is_some() {
        let check = run_task_check(&state, "convert", TaskKind::Conversion, &trace_id, echo);
        if check.status != "pass" {
            status = "fail";
        }
        checks.push(check);
    }
    if status == "pass" && args.install {
        let check = run_task_check(&state, "install", TaskKind::Installation, &trace_id, echo);
        if check.status != "pass" {
            status = "fail";
        }
        checks.push(check);
    }

    let artifact = state
        .controller
        .lock()
        .ok()
        .and_then(|controller| controller.last_artifact().map(|path| path.display().to_string()));

    if args.json {
        let summary = SmokeSummary {
            tool: "aab_apks_tool_smoke",
            status,
            trace_id,
            install_dir,
            artifact,
            checks,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_default()
        );
    } else {
        for check in &checks {
            match &check.error {
                Some(error) => eprintln!("[{}] {} ({} ms): {error}", check.status, check.name, check.duration_ms),
                None => eprintln!("[{}] {} ({} ms)", check.status, check.name, check.duration_ms),
            }
        }
    }

    if status != "pass" {
        std::process::exit(1);
    }
}
