use std::error::Error;

use crossbeam::channel::bounded;
use procwatch::cli::{Cli, Command};
use procwatch::config::store::PersistentStore;
use procwatch::event::channel::{pub_sub, EventConsumer};
use procwatch::logging::Logging;
use procwatch::{Mode, Supervisor, SupervisorEvent};
use tracing::{error, info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    Logging::try_init()?;

    let cli = Cli::parse_args();

    let store = cli
        .store_dir()
        .map(PersistentStore::new)
        .or_else(PersistentStore::in_user_home)
        .ok_or("could not resolve a home directory to store config and crash history in")?;

    let (publisher, consumer) = pub_sub();
    let supervisor = Supervisor::new(store, publisher);

    match cli.command {
        Command::Start { mode } => print_json(&supervisor.start(mode.map(Into::into))),
        Command::Stop => print_json(&supervisor.stop()),
        Command::Restart => print_json(&supervisor.restart()),
        Command::BuildAndRun => print_json(&supervisor.build_and_run()),
        Command::Status => print_json(&supervisor.status()),
        Command::Crashes => print_json(&supervisor.crashes()),
        Command::ClearCrashes => {
            supervisor.clear_crashes();
            info!("crash history cleared");
        }
        Command::Config => print_json(&supervisor.config()),
        command @ Command::UpdateConfig { .. } => {
            let patch = command.as_config_patch();
            print_json(&supervisor.update_config(patch));
        }
        Command::Logs { limit, category } => {
            let logs = supervisor.log_buffer().get_logs(limit, category.map(Into::into));
            print_json(&logs);
        }
        Command::ClearLogs => {
            supervisor.log_buffer().clear();
            info!("log buffer cleared");
        }
        Command::Run { mode } => run_foreground(&supervisor, mode.map(Into::into), consumer)?,
    }

    Ok(())
}

/// Starts the target and blocks, printing every status/crash/log/max-restarts
/// event, until interrupted (Ctrl-C) — the stand-in for the out-of-scope UI
/// shell staying subscribed to the supervisor's event stream.
fn run_foreground(
    supervisor: &std::sync::Arc<Supervisor>,
    mode: Option<Mode>,
    consumer: EventConsumer<SupervisorEvent>,
) -> Result<(), Box<dyn Error>> {
    let initial = supervisor.start(mode);
    print_json(&initial);

    let (shutdown_tx, shutdown_rx) = bounded(1);
    ctrlc::set_handler(move || {
        // A full channel means a shutdown is already in flight; ignore.
        let _ = shutdown_tx.try_send(());
    })?;

    let events = consumer.as_ref();
    loop {
        crossbeam::channel::select! {
            recv(events) -> event => match event {
                Ok(event) => log_event(event),
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => {
                info!("received interrupt, stopping supervisor");
                break;
            }
        }
    }

    print_json(&supervisor.stop());
    Ok(())
}

fn log_event(event: SupervisorEvent) {
    match event {
        SupervisorEvent::StatusChanged(status) => {
            info!(status = ?status.status, pid = ?status.pid, "status-changed");
        }
        SupervisorEvent::Crash(crash) => {
            warn!(exit_code = ?crash.exit_code, signal = ?crash.signal, uptime_ms = crash.uptime_ms, "crash");
        }
        SupervisorEvent::Log(entry) => {
            info!(level = ?entry.level, category = ?entry.category, message = %entry.message, "log");
        }
        SupervisorEvent::MaxRestarts => {
            error!("max-restarts reached, manual restart required");
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => error!(error = %err, "failed to render output as json"),
    }
}
