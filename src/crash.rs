use serde::{Deserialize, Serialize};

/// A single observed crash of the supervised target, as appended to the crash
/// history file and returned by `Supervisor::crashes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashEntry {
    pub timestamp: i64,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub uptime_ms: u64,
    pub stderr: String,
}

impl CrashEntry {
    pub fn new(
        timestamp: i64,
        exit_code: Option<i32>,
        signal: Option<String>,
        uptime_ms: u64,
        stderr: String,
    ) -> Self {
        Self {
            timestamp,
            exit_code,
            signal,
            uptime_ms,
            stderr,
        }
    }
}
