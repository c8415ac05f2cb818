mod patch;
pub mod store;

pub use patch::ConfigPatch;

use serde::{Deserialize, Serialize};

/// Whether the supervised target runs from a built executable or from the
/// project's dev command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dev,
    Production,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Dev
    }
}

fn default_auto_restart() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    5
}

fn default_restart_window_ms() -> u64 {
    300_000
}

fn default_health_check_port() -> u16 {
    3001
}

fn default_health_check_interval_ms() -> u64 {
    10_000
}

/// Persisted supervisor configuration. Unknown fields on read are ignored
/// (serde's default field-skipping behavior); missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target_exe_path: String,
    #[serde(default)]
    pub target_dev_path: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_auto_restart")]
    pub auto_restart: bool,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    #[serde(default = "default_restart_window_ms")]
    pub restart_window_ms: u64,
    #[serde(default = "default_health_check_port")]
    pub health_check_port: u16,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_exe_path: String::new(),
            target_dev_path: String::new(),
            mode: Mode::default(),
            auto_restart: default_auto_restart(),
            max_restarts: default_max_restarts(),
            restart_window_ms: default_restart_window_ms(),
            health_check_port: default_health_check_port(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

impl Config {
    /// The path to run, given the current mode.
    pub fn resolved_exe_path(&self) -> &str {
        match self.mode {
            Mode::Dev => &self.target_dev_path,
            Mode::Production => &self.target_exe_path,
        }
    }

    /// Applies a partial update, returning the merged config. Fields absent
    /// from the patch keep their current value.
    pub fn merged_with(&self, patch: &ConfigPatch) -> Self {
        let mut merged = self.clone();
        if let Some(v) = &patch.target_exe_path {
            merged.target_exe_path = v.clone();
        }
        if let Some(v) = &patch.target_dev_path {
            merged.target_dev_path = v.clone();
        }
        if let Some(v) = patch.mode {
            merged.mode = v;
        }
        if let Some(v) = patch.auto_restart {
            merged.auto_restart = v;
        }
        if let Some(v) = patch.max_restarts {
            merged.max_restarts = v;
        }
        if let Some(v) = patch.restart_window_ms {
            merged.restart_window_ms = v;
        }
        if let Some(v) = patch.health_check_port {
            merged.health_check_port = v;
        }
        if let Some(v) = patch.health_check_interval_ms {
            merged.health_check_interval_ms = v;
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Dev);
        assert!(config.auto_restart);
        assert_eq!(config.max_restarts, 5);
        assert_eq!(config.restart_window_ms, 300_000);
        assert_eq!(config.health_check_port, 3001);
        assert_eq!(config.health_check_interval_ms, 10_000);
    }

    #[test]
    fn unknown_fields_are_ignored_on_read() {
        let json = r#"{"maxRestarts": 3, "somethingUnknown": true}"#;
        // field names in our serde structs are snake_case; an unrelated
        // unknown key must not break deserialization.
        let json = json.replace("maxRestarts", "max_restarts");
        let config: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.health_check_port, 3001);
    }

    #[test]
    fn merge_only_touches_patched_fields() {
        let config = Config::default();
        let patch = ConfigPatch {
            max_restarts: Some(3),
            ..Default::default()
        };
        let merged = config.merged_with(&patch);
        assert_eq!(merged.max_restarts, 3);
        assert_eq!(merged.health_check_port, config.health_check_port);
    }
}
