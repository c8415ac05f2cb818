pub mod backoff;
pub mod cli;
pub mod config;
pub mod context;
pub mod crash;
pub mod event;
pub mod health;
pub mod logging;
pub mod logs;
pub mod process;
pub mod resources;
pub mod supervisor;
pub mod time;
pub mod utils;

pub use config::{Config, ConfigPatch, Mode};
pub use crash::CrashEntry;
pub use event::SupervisorEvent;
pub use logs::{LogCategory, LogEntry, LogLevel, LogSource};
pub use supervisor::{Status, StatusInfo, Supervisor};
