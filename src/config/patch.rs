use super::Mode;
use serde::{Deserialize, Serialize};

/// A partial [`Config`](super::Config) update, as accepted by
/// `Supervisor::update_config`. Every field is optional; absent fields leave
/// the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub target_exe_path: Option<String>,
    #[serde(default)]
    pub target_dev_path: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub auto_restart: Option<bool>,
    #[serde(default)]
    pub max_restarts: Option<u32>,
    #[serde(default)]
    pub restart_window_ms: Option<u64>,
    #[serde(default)]
    pub health_check_port: Option<u16>,
    #[serde(default)]
    pub health_check_interval_ms: Option<u64>,
}
