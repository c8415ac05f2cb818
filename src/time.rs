use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds, the timestamp unit used
/// throughout `CrashEntry`, `LogEntry`, and `StatusInfo`.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}
