pub mod category_arg;
pub mod mode_arg;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use category_arg::CategoryArg;
pub use mode_arg::ModeArg;

use crate::config::ConfigPatch;

/// The command surface of §4.1/§6 of the supervision spec, exposed
/// directly as subcommands — this binary is the stand-in for the
/// out-of-scope UI shell.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Overrides the persisted-store directory (defaults to
    /// `<home>/.claude-launcher`). Mainly useful for running more than one
    /// supervisor instance side by side.
    #[arg(long)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn the target and begin supervising it.
    Start {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Stop the target and cancel any pending restart.
    Stop,
    /// Stop, reset the backoff ladder and crash window, then start.
    Restart,
    /// Run the dev build, then start in production mode on success.
    BuildAndRun,
    /// Print the current status snapshot.
    Status,
    /// Print the crash history.
    Crashes,
    /// Clear the crash history, on disk and in memory.
    ClearCrashes,
    /// Print the current configuration.
    Config,
    /// Merge the given fields into the configuration and persist it.
    UpdateConfig {
        #[arg(long)]
        target_exe_path: Option<String>,
        #[arg(long)]
        target_dev_path: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        #[arg(long)]
        auto_restart: Option<bool>,
        #[arg(long)]
        max_restarts: Option<u32>,
        #[arg(long)]
        restart_window_ms: Option<u64>,
        #[arg(long)]
        health_check_port: Option<u16>,
        #[arg(long)]
        health_check_interval_ms: Option<u64>,
    },
    /// Print buffered log entries.
    Logs {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// Clear the in-memory log ring.
    ClearLogs,
    /// Start the target and stay in the foreground, printing
    /// status/crash/log/max-restarts events until interrupted, stopping
    /// the target on exit.
    Run {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn store_dir(&self) -> Option<PathBuf> {
        self.store_dir.clone()
    }
}

impl Command {
    /// Builds a [`ConfigPatch`] from the `update-config` subcommand's flags.
    /// Only meaningful when `self` is [`Command::UpdateConfig`]; other
    /// variants produce an empty patch.
    pub fn as_config_patch(&self) -> ConfigPatch {
        match self {
            Command::UpdateConfig {
                target_exe_path,
                target_dev_path,
                mode,
                auto_restart,
                max_restarts,
                restart_window_ms,
                health_check_port,
                health_check_interval_ms,
            } => ConfigPatch {
                target_exe_path: target_exe_path.clone(),
                target_dev_path: target_dev_path.clone(),
                mode: mode.map(|m| m.into()),
                auto_restart: *auto_restart,
                max_restarts: *max_restarts,
                restart_window_ms: *restart_window_ms,
                health_check_port: *health_check_port,
                health_check_interval_ms: *health_check_interval_ms,
            },
            _ => ConfigPatch::default(),
        }
    }
}
