use std::sync::Mutex;

use crate::app::config::ToolConfig;
use crate::app::controller::UiController;
use crate::app::sink::{log_channel, LogReceiver, LogSender};

pub struct AppState {
    pub tools: ToolConfig,
    pub controller: Mutex<UiController>,
    pub log_sender: LogSender,
    pub log_receiver: Mutex<LogReceiver>,
}

impl AppState {
    pub fn new(tools: ToolConfig) -> Self {
        let (log_sender, log_receiver) = log_channel();
        Self {
            controller: Mutex::new(UiController::new(&tools.default_port)),
            tools,
            log_sender,
            log_receiver: Mutex::new(log_receiver),
        }
    }
}
