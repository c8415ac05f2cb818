//! Aggregated, categorized log storage for the supervised target: lines
//! captured from its stdout/stderr plus lines tailed from a fixed set of
//! application log files, normalized into a bounded ring buffer.

pub mod buffer;
pub mod classifier;
pub mod tailer;

pub use buffer::LogBuffer;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Console,
    Network,
    Renderer,
    Security,
    System,
    Ipc,
    Performance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub source: LogSource,
}

impl LogEntry {
    pub fn new(
        timestamp: i64,
        level: LogLevel,
        category: LogCategory,
        message: String,
        source: LogSource,
    ) -> Self {
        Self {
            timestamp,
            level,
            category,
            message,
            source,
        }
    }
}
