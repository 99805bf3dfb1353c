//! Short human-readable status lines, kept apart from logging

use std::sync::Mutex;
use tracing::info;

/// Receives one-line summaries such as "Found 12 matches"
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
}

/// Forwards status lines to the `memscan::status` log target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&self, message: &str) {
        info!(target: "memscan::status", "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn status(&self, _message: &str) {}
}

/// Keeps every line, for embedders that poll and for tests
#[derive(Debug, Default)]
pub struct RecordingStatus {
    messages: Mutex<Vec<String>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn last(&self) -> Option<String> {
        self.messages().pop()
    }
}

impl StatusSink for RecordingStatus {
    fn status(&self, message: &str) {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push(message.to_string());
    }
}
