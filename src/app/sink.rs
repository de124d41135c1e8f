use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::app::models::{LogEntry, TaskKind, TaskOutcome};

pub const BANNER_RULE: &str = "========================================";

/// Creates the channel workers use to report back to the UI side.
pub fn log_channel() -> (LogSender, LogReceiver) {
    let (tx, rx) = mpsc::channel();
    (LogSender { tx }, LogReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct LogSender {
    tx: Sender<LogEntry>,
}

impl LogSender {
    pub fn text(&self, line: impl Into<String>) {
        self.send(LogEntry::Text(line.into()));
    }

    /// Sends a block of text, one entry per line.
    pub fn block(&self, text: &str) {
        for line in text.lines() {
            self.text(line.trim_end_matches('\r'));
        }
    }

    pub fn blank(&self) {
        self.text("");
    }

    pub fn finished(&self, task: TaskKind, outcome: TaskOutcome) {
        self.send(LogEntry::TaskFinished { task, outcome });
    }

    fn send(&self, entry: LogEntry) {
        // The receiver only goes away at shutdown; late worker output has nowhere to go.
        let _ = self.tx.send(entry);
    }
}

#[derive(Debug)]
pub struct LogReceiver {
    rx: Receiver<LogEntry>,
}

impl LogReceiver {
    /// Collects everything queued right now without waiting for more.
    pub fn drain(&self) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(entry) => entries.push(entry),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        entries
    }
}
