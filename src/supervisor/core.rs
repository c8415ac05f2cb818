//! The supervisor finite state machine: owns the child process handle, the
//! crash-rate limiter, the backoff timer, and coordinates the log buffer,
//! health prober, and resource sampler for the current run. Grounded on the
//! thread-plus-`Context`-cancellation shape of
//! `sub_agent/on_host/supervisor.rs`, simplified to a single supervised
//! target instead of a fleet of sub-agents.

use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::backoff::Backoff;
use crate::config::store::PersistentStore;
use crate::config::{Config, ConfigPatch, Mode};
use crate::context::Context;
use crate::crash::CrashEntry;
use crate::event::channel::EventPublisher;
use crate::event::SupervisorEvent;
use crate::health::{self, HealthState};
use crate::logs::tailer;
use crate::logs::{LogBuffer, LogCategory, LogSource};
use crate::process::error::CommandError;
use crate::process::shutdown::{ProcessTerminator, GRACEFUL_STOP_TIMEOUT};
use crate::process::{NotStartedProcess, StartedProcess, StderrAccumulator};
use crate::resources::{self, ResourceState};
use crate::time::now_ms;
use crate::utils::threads::spawn_named_thread;

use super::state::{Status, StatusInfo};

const DEV_COMMAND_PROGRAM: &str = "npx";
const DEV_COMMAND_ARGS: &[&str] = &["electron-vite", "dev"];
const BUILD_COMMAND_PROGRAM: &str = "npm";
const BUILD_COMMAND_ARGS: &[&str] = &["run", "build"];

struct ChildInfo {
    pid: u32,
    start_time: Instant,
}

pub struct Supervisor {
    store: PersistentStore,
    config: Mutex<Config>,
    status: Mutex<Status>,
    child: Mutex<Option<ChildInfo>>,
    crashes: Mutex<Vec<CrashEntry>>,
    crash_window: Mutex<Vec<i64>>,
    backoff: Mutex<Backoff>,
    log_buffer: Arc<LogBuffer>,
    health_state: HealthState,
    resource_state: ResourceState,
    publisher: EventPublisher<SupervisorEvent>,
    run_ctx: Mutex<Option<Context<bool>>>,
    backoff_ctx: Mutex<Option<Context<bool>>>,
}

impl Supervisor {
    pub fn new(store: PersistentStore, publisher: EventPublisher<SupervisorEvent>) -> Arc<Self> {
        let config = store.load_config();
        let crashes = store.load_crashes();
        Arc::new(Self {
            store,
            config: Mutex::new(config),
            status: Mutex::new(Status::Idle),
            child: Mutex::new(None),
            crashes: Mutex::new(crashes),
            crash_window: Mutex::new(Vec::new()),
            backoff: Mutex::new(Backoff::new()),
            log_buffer: Arc::new(LogBuffer::new()),
            health_state: HealthState::new(),
            resource_state: ResourceState::new(),
            publisher,
            run_ctx: Mutex::new(None),
            backoff_ctx: Mutex::new(None),
        })
    }

    pub fn log_buffer(&self) -> &Arc<LogBuffer> {
        &self.log_buffer
    }

    pub fn config(&self) -> Config {
        self.config.lock().expect("config mutex poisoned").clone()
    }

    pub fn update_config(&self, patch: ConfigPatch) -> Config {
        let merged = {
            let mut config = self.config.lock().expect("config mutex poisoned");
            *config = config.merged_with(&patch);
            config.clone()
        };
        if let Err(err) = self.store.save_config(&merged) {
            warn!(error = %err, "failed to persist updated config");
        }
        merged
    }

    pub fn crashes(&self) -> Vec<CrashEntry> {
        self.crashes.lock().expect("crashes mutex poisoned").clone()
    }

    pub fn clear_crashes(&self) {
        self.crashes.lock().expect("crashes mutex poisoned").clear();
        self.crash_window.lock().expect("crash window mutex poisoned").clear();
        if let Err(err) = self.store.clear_crashes() {
            warn!(error = %err, "failed to persist crash-history clear");
        }
    }

    pub fn status(&self) -> StatusInfo {
        self.snapshot()
    }

    fn snapshot(&self) -> StatusInfo {
        let status = *self.status.lock().expect("status mutex poisoned");
        let config = self.config();
        let (pid, uptime_ms) = {
            let child = self.child.lock().expect("child mutex poisoned");
            match (&*child, status) {
                (Some(info), Status::Running) => (Some(info.pid), info.start_time.elapsed().as_millis() as u64),
                _ => (None, 0),
            }
        };
        let total_crashes = self.crashes.lock().expect("crashes mutex poisoned").len() as u64;
        let recent_crashes = self.prune_and_count_window(now_ms(), config.restart_window_ms);
        let backoff_ms = self.backoff.lock().expect("backoff mutex poisoned").current_ms();
        let health = self.health_state.snapshot();
        let resources = self.resource_state.snapshot();

        StatusInfo {
            status,
            mode: config.mode,
            exe_path: config.resolved_exe_path().to_string(),
            pid,
            uptime_ms,
            total_crashes,
            recent_crashes,
            backoff_ms,
            last_health_check: health.last_check_ms,
            health_check_ok: health.ok,
            memory: resources.memory_bytes,
            cpu: resources.cpu_percent,
        }
    }

    fn prune_and_count_window(&self, now_ms: i64, window_ms: u64) -> u32 {
        let mut window = self.crash_window.lock().expect("crash window mutex poisoned");
        window.retain(|&ts| now_ms - ts <= window_ms as i64);
        window.len() as u32
    }

    fn set_status(&self, status: Status) {
        *self.status.lock().expect("status mutex poisoned") = status;
        let _ = self.publisher.publish(SupervisorEvent::StatusChanged(self.snapshot()));
    }

    fn push_system_log(&self, message: String) {
        error!(%message, "supervisor error");
        let publisher = self.publisher.clone();
        self.log_buffer.push_raw(&message, LogSource::Stdout, LogCategory::System, now_ms(), move |entry| {
            let _ = publisher.publish(SupervisorEvent::Log(entry));
        });
    }

    fn build_process(&self, config: &Config) -> NotStartedProcess {
        match config.mode {
            Mode::Production => NotStartedProcess::new(&config.target_exe_path, config.health_check_port),
            Mode::Dev => NotStartedProcess::new(DEV_COMMAND_PROGRAM, config.health_check_port)
                .with_args(DEV_COMMAND_ARGS)
                .with_current_dir(&config.target_dev_path),
        }
    }

    fn cancel_backoff_timer(&self) {
        if let Some(ctx) = self.backoff_ctx.lock().expect("backoff context mutex poisoned").take() {
            let _ = ctx.cancel_all(true);
        }
    }

    fn cancel_run_subsystems(&self) {
        if let Some(ctx) = self.run_ctx.lock().expect("run context mutex poisoned").take() {
            let _ = ctx.cancel_all(true);
        }
    }

    /// `start(mode)` — idle/stopped/crashed/max_restarts -> running. Spawns
    /// the target, arms the health/resource/tailer subsystems for this run,
    /// and hands the child off to a monitor thread that performs exit
    /// handling once it observes the child exiting.
    pub fn start(self: &Arc<Self>, mode: Option<Mode>) -> StatusInfo {
        self.cancel_backoff_timer();

        if let Some(mode) = mode {
            self.config.lock().expect("config mutex poisoned").mode = mode;
        }
        let config = self.config();

        let exe_path = config.resolved_exe_path().to_string();
        if exe_path.trim().is_empty() {
            self.push_system_log(format!("cannot start: no path configured for {:?} mode", config.mode));
            self.set_status(Status::Stopped);
            return self.status();
        }

        let started = match self.build_process(&config).start() {
            Ok(process) => process,
            Err(err) => {
                self.push_system_log(format!("failed to spawn target process: {err}"));
                self.set_status(Status::Stopped);
                return self.status();
            }
        };

        let pid = started.pid();
        let stderr_tail = Arc::clone(&started.stderr_tail);
        *self.child.lock().expect("child mutex poisoned") = Some(ChildInfo {
            pid,
            start_time: Instant::now(),
        });

        let started = {
            let buffer_out = Arc::clone(&self.log_buffer);
            let publisher_out = self.publisher.clone();
            let buffer_err = Arc::clone(&self.log_buffer);
            let publisher_err = self.publisher.clone();
            started
                .stream(
                    move |line| {
                        buffer_out.push_raw(&line, LogSource::Stdout, LogCategory::Console, now_ms(), |entry| {
                            let _ = publisher_out.publish(SupervisorEvent::Log(entry));
                        });
                    },
                    move |line| {
                        buffer_err.push_raw(&line, LogSource::Stderr, LogCategory::Console, now_ms(), |entry| {
                            let _ = publisher_err.publish(SupervisorEvent::Log(entry));
                        });
                    },
                )
                .expect("stdout/stderr are always piped for a freshly spawned process")
        };

        self.set_status(Status::Running);
        self.spawn_run_subsystems(&config, pid);
        self.spawn_monitor_thread(started, stderr_tail);

        self.status()
    }

    fn spawn_run_subsystems(self: &Arc<Self>, config: &Config, pid: u32) {
        let ctx: Context<bool> = Context::new();
        *self.run_ctx.lock().expect("run context mutex poisoned") = Some(ctx.clone());

        {
            let watched = tailer::default_watched_files();
            let buffer = Arc::clone(&self.log_buffer);
            let publisher = self.publisher.clone();
            let ctx = ctx.clone();
            spawn_named_thread("log-tailer", move || {
                tailer::run(watched, buffer, ctx, now_ms, move |entry| {
                    let _ = publisher.publish(SupervisorEvent::Log(entry));
                });
            });
        }

        {
            let client: Arc<dyn health::HttpClient> = Arc::new(health::ReqwestHttpClient::default());
            let state = self.health_state.clone();
            let port = config.health_check_port;
            let interval = Duration::from_millis(config.health_check_interval_ms);
            let ctx = ctx.clone();
            spawn_named_thread("health-prober", move || {
                health::run(port, interval, client, state, ctx, now_ms);
            });
        }

        {
            let state = self.resource_state.clone();
            let ctx = ctx.clone();
            spawn_named_thread("resource-sampler", move || {
                resources::run(pid, state, ctx);
            });
        }
    }

    fn spawn_monitor_thread(self: &Arc<Self>, process: StartedProcess, stderr_tail: Arc<Mutex<StderrAccumulator>>) {
        let supervisor = Arc::clone(self);
        spawn_named_thread("target-monitor", move || {
            let exit = process.wait();
            supervisor.handle_exit(exit, stderr_tail);
        });
    }

    fn handle_exit(self: &Arc<Self>, exit: Result<ExitStatus, CommandError>, stderr_tail: Arc<Mutex<StderrAccumulator>>) {
        self.cancel_run_subsystems();

        let uptime_ms = self
            .child
            .lock()
            .expect("child mutex poisoned")
            .take()
            .map(|info| info.start_time.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let was_stopped = *self.status.lock().expect("status mutex poisoned") == Status::Stopped;
        let (exit_code, signal) = match &exit {
            Ok(status) => (status.code(), exit_signal_name(status)),
            Err(err) => {
                warn!(error = %err, "failed to observe child exit status");
                (None, None)
            }
        };

        if was_stopped {
            // stop() already published StatusChanged(Stopped) before this
            // thread observed the exit; nothing changed, nothing to publish.
            return;
        }

        if exit_code == Some(0) {
            self.set_status(Status::Stopped);
            return;
        }

        let stderr = stderr_tail.lock().expect("stderr tail mutex poisoned").tail();
        let entry = CrashEntry::new(now_ms(), exit_code, signal, uptime_ms, stderr);
        self.record_crash(entry.clone());
        let _ = self.publisher.publish(SupervisorEvent::Crash(entry));
        self.set_status(Status::Crashed);

        let config = self.config();
        if !config.auto_restart {
            return;
        }

        let recent = self.prune_and_count_window(now_ms(), config.restart_window_ms);
        if recent >= config.max_restarts {
            self.set_status(Status::MaxRestarts);
            let _ = self.publisher.publish(SupervisorEvent::MaxRestarts);
            return;
        }

        let wait_ms = self.backoff.lock().expect("backoff mutex poisoned").on_crash(uptime_ms);
        self.set_status(Status::Restarting);
        self.schedule_restart(wait_ms);
    }

    fn record_crash(&self, entry: CrashEntry) {
        let crashes = {
            let mut crashes = self.crashes.lock().expect("crashes mutex poisoned");
            crashes.push(entry.clone());
            crashes.clone()
        };
        if let Err(err) = self.store.save_crashes(&crashes) {
            warn!(error = %err, "failed to persist crash history");
        }
        self.crash_window.lock().expect("crash window mutex poisoned").push(entry.timestamp);
    }

    fn schedule_restart(self: &Arc<Self>, wait_ms: u64) {
        let ctx: Context<bool> = Context::new();
        *self.backoff_ctx.lock().expect("backoff context mutex poisoned") = Some(ctx.clone());
        let supervisor = Arc::clone(self);
        spawn_named_thread("restart-timer", move || {
            let (lock, cvar) = ctx.get_lock_cvar();
            let guard = lock.lock().expect("backoff context mutex poisoned");
            if *guard {
                return;
            }
            let (guard, _) = cvar
                .wait_timeout(guard, Duration::from_millis(wait_ms))
                .expect("backoff context condvar poisoned");
            let cancelled = *guard;
            drop(guard);
            if cancelled {
                return;
            }
            supervisor.start(None);
        });
    }

    /// `stop()` — cancels any pending restart timer, signals the child and
    /// waits up to [`GRACEFUL_STOP_TIMEOUT`] before force-killing it. Status
    /// is set to `stopped` before the signal is sent so the monitor thread's
    /// exit handler treats the resulting exit as orderly.
    pub fn stop(self: &Arc<Self>) -> StatusInfo {
        self.cancel_backoff_timer();
        self.set_status(Status::Stopped);
        self.cancel_run_subsystems();

        let child = self.child.lock().expect("child mutex poisoned").take();
        if let Some(info) = child {
            self.terminate_child(info.pid);
        }
        self.status()
    }

    fn terminate_child(&self, pid: u32) {
        let deadline = Instant::now() + GRACEFUL_STOP_TIMEOUT;
        let result = ProcessTerminator::new(pid).shutdown(move || {
            while Instant::now() < deadline {
                if !process_alive(pid) {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            !process_alive(pid)
        });
        if let Err(err) = result {
            warn!(error = %err, pid, "failed to signal child process during stop");
        }
    }

    /// `restart()` — stop, clear the rate-limit window and backoff ladder,
    /// then start. The only way out of `max_restarts`.
    pub fn restart(self: &Arc<Self>) -> StatusInfo {
        self.stop();
        self.crash_window.lock().expect("crash window mutex poisoned").clear();
        self.backoff.lock().expect("backoff mutex poisoned").reset();
        self.start(None)
    }

    /// `buildAndRun()` — stop, run the project's build command with the dev
    /// path as working directory, and on success start in production mode.
    pub fn build_and_run(self: &Arc<Self>) -> StatusInfo {
        let config = self.config();
        if config.target_dev_path.trim().is_empty() {
            self.push_system_log("cannot build: no dev path configured".to_string());
            return self.status();
        }

        self.stop();
        self.push_system_log(format!("building {}", config.target_dev_path));

        match self.run_build_command(&config) {
            Ok(true) => self.start(Some(Mode::Production)),
            Ok(false) => {
                self.push_system_log("build failed".to_string());
                self.status()
            }
            Err(err) => {
                self.push_system_log(format!("build failed to run: {err}"));
                self.status()
            }
        }
    }

    fn run_build_command(&self, config: &Config) -> Result<bool, CommandError> {
        let process = NotStartedProcess::new(BUILD_COMMAND_PROGRAM, config.health_check_port)
            .with_args(BUILD_COMMAND_ARGS)
            .with_current_dir(&config.target_dev_path)
            .start()?;

        let buffer_out = Arc::clone(&self.log_buffer);
        let publisher_out = self.publisher.clone();
        let buffer_err = Arc::clone(&self.log_buffer);
        let publisher_err = self.publisher.clone();
        let process = process.stream(
            move |line| {
                buffer_out.push_raw(&line, LogSource::Stdout, LogCategory::System, now_ms(), |entry| {
                    let _ = publisher_out.publish(SupervisorEvent::Log(entry));
                });
            },
            move |line| {
                buffer_err.push_raw(&line, LogSource::Stderr, LogCategory::System, now_ms(), |entry| {
                    let _ = publisher_err.publish(SupervisorEvent::Log(entry));
                });
            },
        )?;

        Ok(process.wait()?.success())
    }
}

#[cfg(target_family = "unix")]
fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(target_family = "unix"))]
fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(target_family = "unix")]
fn exit_signal_name(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|raw| {
        nix::sys::signal::Signal::try_from(raw)
            .map(|signal| signal.to_string())
            .unwrap_or_else(|_| raw.to_string())
    })
}

#[cfg(not(target_family = "unix"))]
fn exit_signal_name(_status: &ExitStatus) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::channel::pub_sub;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    fn test_supervisor() -> (Arc<Supervisor>, crate::event::channel::EventConsumer<SupervisorEvent>) {
        let dir = tempdir().unwrap();
        let store = PersistentStore::new(dir.path().to_path_buf());
        let (publisher, consumer) = pub_sub();
        (Supervisor::new(store, publisher), consumer)
    }

    #[test]
    fn starts_idle() {
        let (supervisor, _consumer) = test_supervisor();
        assert_eq!(supervisor.status().status, Status::Idle);
    }

    #[test]
    fn misconfigured_start_goes_to_stopped_without_crash() {
        let (supervisor, _consumer) = test_supervisor();
        let status = supervisor.start(Some(Mode::Production));
        assert_eq!(status.status, Status::Stopped);
        assert!(supervisor.crashes().is_empty());
    }

    #[test]
    fn exit_code_zero_is_never_a_crash() {
        let (supervisor, _consumer) = test_supervisor();
        {
            let mut config = supervisor.config.lock().unwrap();
            config.mode = Mode::Production;
            config.target_exe_path = "true".to_string();
        }
        supervisor.start(None);
        std::thread::sleep(StdDuration::from_millis(300));
        let status = supervisor.status();
        assert_eq!(status.status, Status::Stopped);
        assert!(supervisor.crashes().is_empty());
    }

    #[test]
    fn nonzero_exit_is_recorded_as_crash() {
        let (supervisor, _consumer) = test_supervisor();
        {
            let mut config = supervisor.config.lock().unwrap();
            config.mode = Mode::Production;
            config.target_exe_path = "false".to_string();
            config.max_restarts = 100;
        }
        supervisor.start(None);
        std::thread::sleep(StdDuration::from_millis(300));
        assert_eq!(supervisor.crashes().len(), 1);
    }

    #[test]
    fn stop_is_idempotent_and_leaves_stopped() {
        let (supervisor, _consumer) = test_supervisor();
        supervisor.stop();
        supervisor.stop();
        assert_eq!(supervisor.status().status, Status::Stopped);
    }

    #[test]
    fn update_config_persists_and_reads_back() {
        let (supervisor, _consumer) = test_supervisor();
        let patch = ConfigPatch {
            max_restarts: Some(3),
            ..Default::default()
        };
        let merged = supervisor.update_config(patch);
        assert_eq!(merged.max_restarts, 3);
        assert_eq!(supervisor.config().max_restarts, 3);
    }

    #[test]
    fn clear_crashes_empties_history() {
        let (supervisor, _consumer) = test_supervisor();
        supervisor.record_crash(CrashEntry::new(1, Some(1), None, 10, String::new()));
        assert_eq!(supervisor.crashes().len(), 1);
        supervisor.clear_crashes();
        assert!(supervisor.crashes().is_empty());
    }
}
