//! Spawns and supervises the single target process, grounded on the
//! `CommandOSNotStarted`/`CommandOSStarted` state pair in
//! `sub_agent/on_host/command/command_os.rs`: a not-yet-spawned builder type
//! that becomes a started type holding the live `Child` once `start()`
//! succeeds, so a caller can never call process operations before spawning.

pub mod error;
pub mod shutdown;

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use tracing::warn;

use error::CommandError;

/// Tail-preserving accumulator for the stderr a crash report carries.
/// Caps total retained bytes at 10 KiB; `tail` returns the last 2 KiB for
/// `CrashEntry::stderr`.
#[derive(Debug, Default, Clone)]
pub struct StderrAccumulator {
    buf: String,
}

const ACCUMULATOR_CAP_BYTES: usize = 10 * 1024;
const TAIL_BYTES: usize = 2 * 1024;

impl StderrAccumulator {
    pub fn push_line(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
        if self.buf.len() > ACCUMULATOR_CAP_BYTES {
            let excess = self.buf.len() - ACCUMULATOR_CAP_BYTES;
            let cut = self.buf.char_indices().find(|(i, _)| *i >= excess).map(|(i, _)| i).unwrap_or(self.buf.len());
            self.buf.drain(..cut);
        }
    }

    pub fn tail(&self) -> String {
        if self.buf.len() <= TAIL_BYTES {
            return self.buf.clone();
        }
        let start = self.buf.len() - TAIL_BYTES;
        let start = self.buf[start..].char_indices().next().map(|_| start).unwrap_or(0);
        let start = (start..self.buf.len())
            .find(|&i| self.buf.is_char_boundary(i))
            .unwrap_or(0);
        self.buf[start..].to_string()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

pub struct NotStartedProcess {
    cmd: Command,
}

pub struct StartedProcess {
    child: Child,
    pid: u32,
    spawned_at: Instant,
    pub stderr_tail: Arc<Mutex<StderrAccumulator>>,
}

impl NotStartedProcess {
    /// Builds a command for `exe_path`, piping stdout/stderr, and injecting
    /// the port the supervised process should serve health checks on.
    pub fn new(exe_path: &str, health_check_port: u16) -> Self {
        let mut cmd = Command::new(exe_path);
        cmd.env("HEKABRAIN_API_PORT", health_check_port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Self { cmd }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.cmd.args(args);
        self
    }

    pub fn with_current_dir(mut self, dir: &str) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    pub fn start(mut self) -> Result<StartedProcess, CommandError> {
        let child = self.cmd.spawn()?;
        Ok(StartedProcess {
            pid: child.id(),
            child,
            spawned_at: Instant::now(),
            stderr_tail: Arc::new(Mutex::new(StderrAccumulator::default())),
        })
    }
}

impl StartedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn uptime_ms(&self) -> u64 {
        self.spawned_at.elapsed().as_millis() as u64
    }

    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().is_ok_and(|status| status.is_none())
    }

    pub fn wait(mut self) -> Result<ExitStatus, CommandError> {
        self.child.wait().map_err(CommandError::from)
    }

    /// Spawns reader threads over stdout and stderr, invoking the given
    /// callbacks per line. Stderr lines are also appended to
    /// [`StartedProcess::stderr_tail`] for crash reporting.
    pub fn stream<FOut, FErr>(mut self, on_stdout: FOut, on_stderr: FErr) -> Result<Self, CommandError>
    where
        FOut: Fn(String) + Send + 'static,
        FErr: Fn(String) + Send + 'static,
    {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| CommandError::StreamPipeError("stdout".to_string()))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| CommandError::StreamPipeError("stderr".to_string()))?;

        spawn_line_reader("target-stdout", stdout, on_stdout);

        let tail = Arc::clone(&self.stderr_tail);
        spawn_line_reader("target-stderr", stderr, move |line: String| {
            if let Ok(mut tail) = tail.lock() {
                tail.push_line(&line);
            }
            on_stderr(line);
        });

        Ok(self)
    }
}

fn spawn_line_reader<R, F>(name: &'static str, pipe: R, on_line: F)
where
    R: std::io::Read + Send + 'static,
    F: Fn(String) + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let reader = BufReader::new(pipe);
            for line in reader.lines() {
                match line {
                    Ok(line) => on_line(line),
                    Err(err) => {
                        warn!(error = %err, thread = name, "error reading process output");
                        break;
                    }
                }
            }
        })
        .expect("failed to spawn process output reader thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn spawns_and_reports_pid_and_exit_status() {
        let process = NotStartedProcess::new("true", 3001).start().unwrap();
        assert!(process.pid() > 0);
        let status = process.wait().unwrap();
        assert!(status.success());
    }

    #[test]
    fn streams_stdout_lines_to_callback() {
        let mut process = NotStartedProcess::new("sh", 3001);
        process.cmd.arg("-c").arg("echo one; echo two >&2");
        let process = process.start().unwrap();

        let (out_tx, out_rx) = mpsc::channel();
        let (err_tx, err_rx) = mpsc::channel();
        let process = process
            .stream(
                move |line| out_tx.send(line).unwrap(),
                move |line| err_tx.send(line).unwrap(),
            )
            .unwrap();
        let stderr_tail = Arc::clone(&process.stderr_tail);
        process.wait().unwrap();

        assert_eq!(out_rx.recv().unwrap(), "one");
        assert_eq!(err_rx.recv().unwrap(), "two");
        assert!(stderr_tail.lock().unwrap().tail().contains("two"));
    }

    #[test]
    fn stderr_accumulator_caps_and_keeps_tail() {
        let mut acc = StderrAccumulator::default();
        for i in 0..2000 {
            acc.push_line(&format!("line {i}"));
        }
        assert!(acc.buf.len() <= ACCUMULATOR_CAP_BYTES);
        assert!(acc.tail().len() <= TAIL_BYTES);
        assert!(acc.tail().contains("line 1999"));
    }

    #[test]
    fn uptime_grows_with_time() {
        let mut process = NotStartedProcess::new("sleep", 3001);
        process.cmd.arg("1");
        let mut process = process.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(process.uptime_ms() >= 20);
        let pid = process.pid() as i32;
        let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::SIGKILL);
        let _ = process.wait();
    }
}
