//! Construction-time wiring and orderly shutdown.

use crate::bus::{TelemetryPublisher, TelemetryPump};
use crate::command_handler::CommandHandler;
use crate::config::SupervisorConfig;
use crate::config_loader;
use crate::monitor::Monitor;
use crate::process_manager::ProcessManager;
use crate::subsystem::Registry;
use crate::{env, success};
use std::path::Path;
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicBool};
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::SignalKind;
use tokio::sync::{mpsc, watch};

pub struct Supervisor {
    pm: ProcessManager,
    monitor: Monitor,
    handler: CommandHandler,
    command_rx: mpsc::UnboundedReceiver<Vec<String>>,
    bus_pump: TelemetryPump,
    stopping: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Supervisor {
    /// Wire every component against the platform root (`SPOT_DIR` and the
    /// paths derived from it in `env`). Fails only on an unbindable bus
    /// port or an unreadable subsystems directory.
    pub async fn new() -> crate::Result<Self> {
        let config = Arc::new(SupervisorConfig::load(&*env::SPOT_CONFIG_FILE));
        let (bus, bus_pump) = TelemetryPublisher::bind(config.port_interprocess).await?;

        let subsystems = config_loader::load_subsystems(&env::SPOT_SUBSYSTEMS_DIR)?;
        let registry = Registry::new(subsystems);

        let stopping = Arc::new(AtomicBool::new(false));
        let pm = ProcessManager::new(
            registry.clone(),
            config.clone(),
            bus.clone(),
            stopping.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler = CommandHandler::new(
            registry.clone(),
            pm.clone(),
            bus.clone(),
            shutdown_tx.clone(),
        );

        // the command channel is injected after both sides exist, breaking
        // the process-manager <-> command-handler cycle
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        pm.set_command_sender(command_tx);

        let monitor = Monitor::new(registry, pm.clone(), config);

        Ok(Self {
            pm,
            monitor,
            handler,
            command_rx,
            bus_pump,
            stopping,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Run until a signal or a confirmed restart-all requests shutdown.
    pub async fn start(self) -> crate::Result<()> {
        let Supervisor {
            pm,
            monitor,
            handler,
            command_rx,
            bus_pump,
            stopping,
            shutdown_tx,
            mut shutdown_rx,
        } = self;

        banner();
        install_signals(shutdown_tx)?;

        info!("Starting supervisor...");
        pm.start_all().await;

        let monitor_rx = shutdown_rx.clone();
        let monitor_task = tokio::spawn(async move { monitor.run(monitor_rx).await });
        let command_task = tokio::spawn(handler.run(command_rx));

        while !*shutdown_rx.borrow_and_update() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }

        warn!("Supervisor shutting down...");
        stopping.store(true, atomic::Ordering::SeqCst);

        pm.stop_all().await;

        monitor_task.abort();
        command_task.abort();
        let _ = monitor_task.await;
        let _ = command_task.await;

        bus_pump.close().await;
        info!("Supervisor shutdown complete");
        Ok(())
    }
}

fn banner() {
    warn!(r"   _______  ____  ______");
    warn!(r"  / __/ _ \/ __ \/_  __/");
    warn!(r" _\ \/ ___/ /_/ / / /");
    warn!(r"/___/_/   \____/ /_/");
    warn!("SOFTWARE PLATFORM for");
    warn!("ONBOARD TELEMETRY");
    let (branch, commit) = git_branch_commit();
    success!("v{} {branch} @ {commit}", env!("CARGO_PKG_VERSION"));
}

/// Best-effort `(branch, short commit)` of the supervisor's own checkout,
/// found by walking up from the invocation directory. The banner reports
/// which build of the software the rover is running, not anything about the
/// operator's platform root.
fn git_branch_commit() -> (String, String) {
    let Ok(mut dir) = std::env::current_dir() else {
        return ("-".to_string(), "-".to_string());
    };
    loop {
        let git_dir = dir.join(".git");
        if git_dir.join("HEAD").is_file() {
            return read_git_head(&git_dir);
        }
        if !dir.pop() {
            return ("-".to_string(), "-".to_string());
        }
    }
}

/// `("-", "-")` when HEAD is unreadable (deployed rovers run from a plain
/// directory).
fn read_git_head(git_dir: &Path) -> (String, String) {
    let Ok(head) = std::fs::read_to_string(git_dir.join("HEAD")) else {
        return ("-".to_string(), "-".to_string());
    };
    let head = head.trim();
    if let Some(ref_path) = head.strip_prefix("ref:") {
        let ref_path = ref_path.trim();
        let branch = ref_path.rsplit('/').next().unwrap_or("-").to_string();
        let commit = std::fs::read_to_string(git_dir.join(ref_path))
            .map(|c| c.trim().chars().take(7).collect())
            .unwrap_or_else(|_| "-".to_string());
        (branch, commit)
    } else {
        ("DETACHED".to_string(), head.chars().take(7).collect())
    }
}

#[cfg(unix)]
fn install_signals(shutdown: watch::Sender<bool>) -> crate::Result<()> {
    use miette::IntoDiagnostic;

    static RECEIVED_SIGNAL: AtomicBool = AtomicBool::new(false);
    for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
        let shutdown = shutdown.clone();
        let mut stream = signal::unix::signal(kind).into_diagnostic()?;
        tokio::spawn(async move {
            loop {
                stream.recv().await;
                if RECEIVED_SIGNAL.swap(true, atomic::Ordering::SeqCst) {
                    // second signal means the operator is done waiting
                    exit(1);
                }
                info!("received signal, stopping");
                let _ = shutdown.send(true);
            }
        });
    }
    Ok(())
}

#[cfg(windows)]
fn install_signals(shutdown: watch::Sender<bool>) -> crate::Result<()> {
    static RECEIVED_SIGNAL: AtomicBool = AtomicBool::new(false);
    tokio::spawn(async move {
        loop {
            if let Err(err) = signal::ctrl_c().await {
                error!("failed to wait for ctrl-c: {err}");
                return;
            }
            if RECEIVED_SIGNAL.swap(true, atomic::Ordering::SeqCst) {
                exit(1);
            }
            info!("received ctrl-c, stopping");
            let _ = shutdown.send(true);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_git_head_fallback() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            read_git_head(&dir.path().join(".git")),
            ("-".to_string(), "-".to_string())
        );
    }

    #[test]
    fn test_read_git_head_on_branch() {
        let dir = tempfile::tempdir().unwrap();
        let git = dir.path().join(".git");
        std::fs::create_dir_all(git.join("refs/heads")).unwrap();
        std::fs::write(git.join("HEAD"), "ref: refs/heads/field-trial\n").unwrap();
        std::fs::write(
            git.join("refs/heads/field-trial"),
            "0123456789abcdef0123456789abcdef01234567\n",
        )
        .unwrap();
        assert_eq!(
            read_git_head(&git),
            ("field-trial".to_string(), "0123456".to_string())
        );
    }

    #[test]
    fn test_read_git_head_detached() {
        let dir = tempfile::tempdir().unwrap();
        let git = dir.path().join(".git");
        std::fs::create_dir_all(&git).unwrap();
        std::fs::write(
            git.join("HEAD"),
            "fedcba9876543210fedcba9876543210fedcba98\n",
        )
        .unwrap();
        assert_eq!(
            read_git_head(&git),
            ("DETACHED".to_string(), "fedcba9".to_string())
        );
    }
}
