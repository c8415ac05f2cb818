//! Exponential restart backoff with a stability reset, grounded on the
//! ladder/reset shape of `sub_agent/on_host/command/restart_policy.rs` but
//! simplified to the fixed rung sequence the supervisor requires.

const RUNGS_MS: [u64; 6] = [1_000, 2_000, 4_000, 8_000, 16_000, 30_000];
const STABILITY_THRESHOLD_MS: u64 = 60_000;

/// Tracks the delay to use before the next restart attempt. `on_crash`
/// returns the delay to schedule *this* restart with, then advances the
/// ladder in preparation for a further crash; a long enough preceding
/// uptime resets the ladder to its first rung instead of advancing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    rung: usize,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { rung: 0 }
    }

    pub fn current_ms(&self) -> u64 {
        RUNGS_MS[self.rung]
    }

    /// Records a crash after `uptime_ms` of runtime, returning the delay to
    /// schedule the next restart with.
    pub fn on_crash(&mut self, uptime_ms: u64) -> u64 {
        if uptime_ms > STABILITY_THRESHOLD_MS {
            self.reset();
        }
        let wait_ms = self.current_ms();
        self.rung = (self.rung + 1).min(RUNGS_MS.len() - 1);
        wait_ms
    }

    /// Resets the ladder to the first rung, as on a manual `restart()`.
    pub fn reset(&mut self) {
        self.rung = 0;
    }
}
