pub mod channel;

use crate::crash::CrashEntry;
use crate::logs::LogEntry;
use crate::supervisor::state::StatusInfo;

/// Everything the supervisor core pushes to its listeners. A UI shell (out of
/// scope for this crate) would subscribe to an `EventConsumer<SupervisorEvent>`
/// and translate each variant into its own IPC message.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    StatusChanged(StatusInfo),
    Crash(CrashEntry),
    Log(LogEntry),
    MaxRestarts,
}
