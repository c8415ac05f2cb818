use std::time::Duration;

use super::error::CommandError;

/// Sends a supervised child process a SIGTERM, then escalates to SIGKILL if
/// the caller-supplied predicate hasn't reported the process gone before the
/// predicate returns `false`.
pub struct ProcessTerminator {
    pid: u32,
}

impl ProcessTerminator {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }

    #[cfg(target_family = "unix")]
    /// `wait_for_exit` should block (polling as needed) until either the
    /// process has exited (return `true`) or it gives up (return `false`).
    pub fn shutdown<F>(self, wait_for_exit: F) -> Result<(), CommandError>
    where
        F: FnOnce() -> bool,
    {
        use nix::{sys::signal, unistd::Pid};
        signal::kill(Pid::from_raw(self.pid as i32), signal::SIGTERM)
            .map_err(|err| CommandError::NixError(err.to_string()))?;

        if !wait_for_exit() {
            signal::kill(Pid::from_raw(self.pid as i32), signal::SIGKILL)
                .map_err(|err| CommandError::NixError(err.to_string()))?;
        }
        Ok(())
    }

    #[cfg(target_family = "windows")]
    pub fn shutdown<F>(self, _wait_for_exit: F) -> Result<(), CommandError>
    where
        F: FnOnce() -> bool,
    {
        // Windows has no SIGTERM equivalent; the process is killed directly.
        std::process::Command::new("taskkill")
            .args(["/PID", &self.pid.to_string(), "/F"])
            .status()
            .map(|_| ())
            .map_err(CommandError::from)
    }
}

/// Standard stop timeout: SIGTERM, then up to this long before SIGKILL.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(all(test, target_family = "unix"))]
mod tests {
    use super::*;
    use std::{
        process::Command,
        thread::{self, sleep},
        time::{Duration, Instant},
    };

    #[test]
    fn sigterm_lets_a_well_behaved_process_exit() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap 'exit 0' TERM; while true; do sleep 1; done")
            .spawn()
            .unwrap();
        sleep(Duration::from_millis(200));

        let pid = child.id();
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(2);
            let _ = ProcessTerminator::new(pid).shutdown(move || {
                while Instant::now() < deadline {
                    sleep(Duration::from_millis(20));
                }
                false
            });
        });

        let status = child.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn escalates_to_sigkill_when_predicate_gives_up() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; while true; do sleep 1; done")
            .spawn()
            .unwrap();
        sleep(Duration::from_millis(200));

        let pid = child.id();
        thread::spawn(move || {
            let _ = ProcessTerminator::new(pid).shutdown(|| false);
        });

        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
