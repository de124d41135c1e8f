pub mod app;

use app::commands::{
    drain_log, get_view, pick_archive, pick_bundle, reveal_last_artifact, select_archive,
    select_bundle, set_port, set_signing, start_conversion, start_installation,
};
use app::config::ToolConfig;
use app::logging::init_logging;
use app::state::AppState;
use tracing::{info, warn};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_logging();
    let tools = ToolConfig::resolve("startup").unwrap_or_else(|err| {
        warn!(error = %err, "falling back to the working directory for tool files");
        ToolConfig::with_install_dir(".")
    });
    info!(install_dir = %tools.install_dir.display(), "tool locations resolved");

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .manage(AppState::new(tools))
        .invoke_handler(tauri::generate_handler![
            get_view,
            pick_bundle,
            pick_archive,
            select_bundle,
            select_archive,
            set_port,
            set_signing,
            start_conversion,
            start_installation,
            drain_log,
            reveal_last_artifact
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
