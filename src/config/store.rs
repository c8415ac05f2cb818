use std::path::{Path, PathBuf};

use directories::UserDirs;
use thiserror::Error;
use tracing::warn;

use crate::crash::CrashEntry;

use super::Config;

const CONFIG_FILE_NAME: &str = "watchdog-config.json";
const CRASHES_FILE_NAME: &str = "watchdog-crashes.json";
const STORE_DIR_NAME: &str = ".claude-launcher";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("error creating store directory: `{0}`")]
    DirectoryCreation(#[source] std::io::Error),

    #[error("error reading `{path}`: `{source}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing `{path}`: `{source}`")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error decoding `{path}`: `{source}`")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error encoding for `{path}`: `{source}`")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads and writes the two JSON documents the supervisor persists:
/// configuration and crash history. Single writer (the supervisor), no
/// locking. Reads are tolerant of the directory or files being absent;
/// writes are full-file, pretty-printed overwrites.
pub struct PersistentStore {
    dir: PathBuf,
}

impl PersistentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Resolves `<home>/.claude-launcher` via the platform's home directory.
    pub fn in_user_home() -> Option<Self> {
        UserDirs::new().map(|dirs| Self::new(dirs.home_dir().join(STORE_DIR_NAME)))
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    fn crashes_path(&self) -> PathBuf {
        self.dir.join(CRASHES_FILE_NAME)
    }

    /// Returns the default config if the file is absent or unreadable as
    /// JSON; unknown fields are ignored per [`Config`]'s serde defaults.
    pub fn load_config(&self) -> Config {
        let path = self.config_path();
        match read_json(&path) {
            Ok(config) => config,
            Err(StoreError::Read { .. }) => Config::default(),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to parse persisted config, using defaults");
                Config::default()
            }
        }
    }

    pub fn save_config(&self, config: &Config) -> Result<(), StoreError> {
        self.ensure_dir()?;
        write_json(&self.config_path(), config)
    }

    /// Returns an empty history if the file is absent or unreadable.
    pub fn load_crashes(&self) -> Vec<CrashEntry> {
        let path = self.crashes_path();
        match read_json(&path) {
            Ok(crashes) => crashes,
            Err(StoreError::Read { .. }) => Vec::new(),
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to parse persisted crash history, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save_crashes(&self, crashes: &[CrashEntry]) -> Result<(), StoreError> {
        self.ensure_dir()?;
        write_json(&self.crashes_path(), crashes)
    }

    pub fn clear_crashes(&self) -> Result<(), StoreError> {
        self.save_crashes(&[])
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(StoreError::DirectoryCreation)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut rendered = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    rendered.push('\n');
    std::fs::write(path, rendered).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
