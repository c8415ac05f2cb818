use serde::{Deserialize, Serialize};

use crate::config::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Running,
    Crashed,
    Restarting,
    Stopped,
    MaxRestarts,
}

/// A full, consistent snapshot of the supervisor. Cheap to produce: every
/// field is copied out of its own lock in turn, so `status()` never blocks
/// on anything but a brief mutex acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: Status,
    pub mode: Mode,
    pub exe_path: String,
    pub pid: Option<u32>,
    pub uptime_ms: u64,
    pub total_crashes: u64,
    pub recent_crashes: u32,
    pub backoff_ms: u64,
    pub last_health_check: Option<i64>,
    pub health_check_ok: bool,
    pub memory: Option<u64>,
    pub cpu: Option<f64>,
}
