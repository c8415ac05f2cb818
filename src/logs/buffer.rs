use std::collections::VecDeque;
use std::sync::Mutex;

use super::classifier::classify;
use super::{LogCategory, LogEntry, LogLevel, LogSource};

pub const CAPACITY: usize = 5_000;

/// Bounded FIFO ring of classified log entries, shared between the
/// supervisor's direct stdout/stderr pushes and the file tailer.
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(CAPACITY)),
        }
    }

    /// Splits `raw` on newlines, drops empty lines, classifies and appends
    /// each, invoking `on_entry` for every pushed entry (the supervisor uses
    /// this to emit `log` events). `now_ms` is supplied by the caller since
    /// entries need a caller-controlled clock for testability.
    pub fn push_raw(
        &self,
        raw: &str,
        source: LogSource,
        default_category: LogCategory,
        now_ms: i64,
        mut on_entry: impl FnMut(LogEntry),
    ) {
        for line in raw.split('\n') {
            if line.is_empty() {
                continue;
            }
            let (level, category) = classify(line, source, default_category);
            let entry = LogEntry::new(now_ms, level, category, line.to_string(), source);
            self.push_entry(entry.clone());
            on_entry(entry);
        }
    }

    fn push_entry(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().expect("log buffer mutex poisoned");
        if entries.len() >= CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Returns the tail of the ring, filtered by category (if given) then
    /// truncated to the last `limit` entries (if given).
    pub fn get_logs(&self, limit: Option<usize>, category: Option<LogCategory>) -> Vec<LogEntry> {
        let entries = self.entries.lock().expect("log buffer mutex poisoned");
        let filtered: Vec<LogEntry> = entries
            .iter()
            .filter(|entry| category.map_or(true, |c| entry.category == c))
            .cloned()
            .collect();
        match limit {
            Some(limit) if filtered.len() > limit => filtered[filtered.len() - limit..].to_vec(),
            _ => filtered,
        }
    }

    pub fn clear(&self) {
        self.entries.lock().expect("log buffer mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("log buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
