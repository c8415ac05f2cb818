//! Periodic resident-memory sampling for the supervised child. Linux-only
//! implementation via `/proc/<pid>/status`; other platforms always report
//! `None` rather than guess at a parsing strategy this crate can't verify.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::Context;

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSnapshot {
    pub memory_bytes: Option<u64>,
    pub cpu_percent: Option<f64>,
}

#[derive(Clone, Default)]
pub struct ResourceState(Arc<Mutex<ResourceSnapshot>>);

impl ResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        *self.0.lock().expect("resource state mutex poisoned")
    }

    fn record(&self, memory_bytes: Option<u64>) {
        let mut snapshot = self.0.lock().expect("resource state mutex poisoned");
        snapshot.memory_bytes = memory_bytes;
        // CPU percentage has no consistent cheap source on any platform
        // this crate targets; left null per design.
        snapshot.cpu_percent = None;
    }

    /// Resets both fields to null, as happens when the child exits.
    pub fn clear(&self) {
        let mut snapshot = self.0.lock().expect("resource state mutex poisoned");
        *snapshot = ResourceSnapshot::default();
    }
}

#[cfg(target_os = "linux")]
fn sample_memory_bytes(pid: u32) -> Option<u64> {
    let contents = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    contents.lines().find_map(|line| {
        let rest = line.strip_prefix("VmRSS:")?;
        let kb: u64 = rest.trim().split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

#[cfg(not(target_os = "linux"))]
fn sample_memory_bytes(_pid: u32) -> Option<u64> {
    None
}

/// Runs the sampler loop until `ctx` is cancelled.
pub fn run(pid: u32, state: ResourceState, ctx: Context<bool>) {
    loop {
        state.record(sample_memory_bytes(pid));

        let (lock, cvar) = ctx.get_lock_cvar();
        let guard = lock.lock().expect("resource context mutex poisoned");
        if *guard {
            break;
        }
        let (guard, _) = cvar
            .wait_timeout(guard, SAMPLE_INTERVAL)
            .expect("resource context condvar poisoned");
        if *guard {
            break;
        }
    }
    state.clear();
}
