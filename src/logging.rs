//! Structured publish log.
//!
//! Plugins and the manager report progress through a [`PublishLogger`].
//! Every entry is mirrored to `tracing`; an optional callback receives the
//! structured entry (with its action attachment) for presentation elsewhere.
//! A failing callback is contained here and never reaches the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Rich attachment a presenter may offer next to a log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LogAction {
    /// Reveal a file on disk.
    ShowFile { path: PathBuf },
    /// Open a URL.
    OpenUrl { url: String },
    /// Show additional detail text.
    ShowMore { text: String },
}

/// One structured log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<LogAction>,
}

type LogCallback = Box<dyn Fn(&LogEntry) + Send + Sync>;

/// Log sink handed to plugins through the run context.
pub struct PublishLogger {
    callback: Option<LogCallback>,
}

impl PublishLogger {
    /// Create a logger that forwards entries to `callback`.
    pub fn new(callback: impl Fn(&LogEntry) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Create a logger that only emits `tracing` events.
    pub fn tracing_only() -> Self {
        Self { callback: None }
    }

    /// Create a logger that records every entry in memory.
    pub fn recording() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = entries.clone();
        let logger = Self::new(move |entry| sink.lock().push(entry.clone()));
        (logger, entries)
    }

    /// Emit an entry.
    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            LogLevel::Debug => tracing::debug!("{}", entry.message),
            LogLevel::Info => tracing::info!("{}", entry.message),
            LogLevel::Warning => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
        }

        if let Some(ref callback) = self.callback {
            if catch_unwind(AssertUnwindSafe(|| callback(&entry))).is_err() {
                tracing::warn!("Publish log callback panicked; entry dropped");
            }
        }
    }

    /// Emit an entry with an action attachment.
    pub fn log_with_action(&self, level: LogLevel, message: impl Into<String>, action: LogAction) {
        self.log(LogEntry {
            level,
            message: message.into(),
            action: Some(action),
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message);
    }

    fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.log(LogEntry {
            level,
            message: message.into(),
            action: None,
        });
    }
}

impl Default for PublishLogger {
    fn default() -> Self {
        Self::tracing_only()
    }
}

impl std::fmt::Debug for PublishLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishLogger")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_logger_keeps_entries() {
        let (logger, entries) = PublishLogger::recording();
        logger.info("collected 2 items");
        logger.log_with_action(
            LogLevel::Warning,
            "missing thumbnail",
            LogAction::ShowFile {
                path: PathBuf::from("/tmp/a.png"),
            },
        );

        let entries = entries.lock();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "collected 2 items");
        assert!(matches!(entries[1].action, Some(LogAction::ShowFile { .. })));
    }

    #[test]
    fn panicking_callback_is_contained() {
        let logger = PublishLogger::new(|_| panic!("presenter crashed"));
        logger.error("this must not unwind");
    }

    #[test]
    fn entry_serializes_action_tag() {
        let entry = LogEntry {
            level: LogLevel::Info,
            message: "done".into(),
            action: Some(LogAction::OpenUrl {
                url: "https://catalog.local/1".into(),
            }),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "info");
        assert_eq!(json["action"]["action"], "open_url");
    }
}
