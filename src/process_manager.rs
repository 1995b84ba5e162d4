//! Child process lifecycle and stream plumbing.
//!
//! The process manager is the only component that spawns, signals, or reaps
//! subsystem children. Each live child gets two reader tasks (stdout and
//! stderr) that feed the line demux: heartbeats update the registry, inline
//! commands go to the command channel, telemetry envelopes and log lines go
//! to the bus.

use crate::bus::TelemetryPublisher;
use crate::config::SupervisorConfig;
use crate::demux::{self, LineKind, StreamSource};
use crate::logger::Severity;
use crate::subsystem::{Registry, Subsystem};
use crate::success;
use indexmap::IndexMap;
use miette::IntoDiagnostic;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

/// Wall-clock budget for a graceful stop before escalating to a hard kill.
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ProcessManager {
    registry: Registry,
    config: Arc<SupervisorConfig>,
    bus: TelemetryPublisher,
    /// Injected after the command handler exists, breaking the construction
    /// cycle between the two.
    command_tx: Arc<OnceLock<mpsc::UnboundedSender<Vec<String>>>>,
    stopping: Arc<AtomicBool>,
}

impl ProcessManager {
    pub fn new(
        registry: Registry,
        config: Arc<SupervisorConfig>,
        bus: TelemetryPublisher,
        stopping: Arc<AtomicBool>,
    ) -> Self {
        Self {
            registry,
            config,
            bus,
            command_tx: Arc::new(OnceLock::new()),
            stopping,
        }
    }

    pub fn set_command_sender(&self, tx: mpsc::UnboundedSender<Vec<String>>) {
        let _ = self.command_tx.set(tx);
    }

    /// Launch every subsystem in three sequential priority tiers. Starts
    /// within a tier run in parallel; the next tier only begins once the
    /// whole tier has returned, so bus infrastructure is listening before
    /// its producers come up.
    pub async fn start_all(&self) {
        let tiers = {
            let subs = self.registry.lock().await;
            partition_tiers(&subs)
        };
        for (i, names) in tiers.iter().enumerate() {
            if names.is_empty() {
                continue;
            }
            info!("Launching TIER {}: {names:?}", i + 1);
            let mut set = JoinSet::new();
            for name in names {
                let pm = self.clone();
                let name = name.clone();
                // start() reports its own failures; the monitor retries
                set.spawn(async move {
                    let _ = pm.start(&name).await;
                });
            }
            while set.join_next().await.is_some() {}
        }
    }

    /// Spawn one subsystem. A no-op when a live child already exists.
    pub async fn start(&self, name: &str) -> crate::Result<()> {
        let (child_pipes, pid) = {
            let mut subs = self.registry.lock().await;
            let Some(sub) = subs.get_mut(name) else {
                miette::bail!("unknown subsystem {name}");
            };
            if let Some(child) = sub.process.as_mut() {
                match child.try_wait() {
                    Ok(None) => {
                        warn!("{name} already running");
                        return Ok(());
                    }
                    // exited but the monitor has not reaped it yet
                    _ => sub.process = None,
                }
            }

            let mut cmd = Command::new(&sub.path);
            cmd.arg("--heartbeat")
                .arg(self.config.heartbeat_interval.to_string())
                .args(&sub.extra_args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            // Command::spawn is synchronous, so the record mutation below is
            // atomic under the registry lock.
            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(err) => {
                    error!("Failed to start {name}: {err}");
                    sub.process = None;
                    return Err(err).into_diagnostic();
                }
            };
            let pipes = (child.stdout.take(), child.stderr.take());
            let pid = child.id();
            sub.process = Some(child);
            sub.last_heartbeat = Some(Instant::now());
            sub.intentionally_stopped = false;
            (pipes, pid)
        };

        success!("{name} started (pid {})", pid.unwrap_or(0));

        if let Some(stdout) = child_pipes.0 {
            let pm = self.clone();
            let name = name.to_string();
            tokio::spawn(async move { pm.read_stream(&name, stdout, StreamSource::Stdout).await });
        }
        if let Some(stderr) = child_pipes.1 {
            let pm = self.clone();
            let name = name.to_string();
            tokio::spawn(async move { pm.read_stream(&name, stderr, StreamSource::Stderr).await });
        }
        Ok(())
    }

    /// Gracefully stop one subsystem and mark it operator-stopped so the
    /// monitor leaves it alone. Safe when no child exists.
    pub async fn stop(&self, name: &str) {
        let child = {
            let mut subs = self.registry.lock().await;
            let Some(sub) = subs.get_mut(name) else {
                return;
            };
            sub.intentionally_stopped = true;
            sub.restart_pending = false;
            sub.process.take()
        };
        let Some(child) = child else {
            info!("{name} already stopped");
            return;
        };
        self.terminate(name, child).await;
        warn!("{name} stopped");
    }

    /// Parallel graceful stop across the whole registry.
    pub async fn stop_all(&self) {
        let mut set = JoinSet::new();
        for name in self.registry.names().await {
            let pm = self.clone();
            set.spawn(async move { pm.stop(&name).await });
        }
        while set.join_next().await.is_some() {}
    }

    /// Immediate hard kill, used by the monitor on a stalled child. Does not
    /// mark the subsystem operator-stopped.
    pub async fn kill(&self, name: &str) {
        let child = self
            .registry
            .with(name, |sub| sub.process.take())
            .await
            .flatten();
        let Some(mut child) = child else {
            return;
        };
        if let Err(err) = child.kill().await {
            debug!("failed to kill {name}: {err}");
        }
    }

    /// Whether a live (spawned and not yet exited) child exists for `name`.
    pub async fn is_running(&self, name: &str) -> bool {
        self.registry
            .with(name, |sub| match sub.process.as_mut() {
                Some(child) => matches!(child.try_wait(), Ok(None)),
                None => false,
            })
            .await
            .unwrap_or(false)
    }

    async fn terminate(&self, name: &str, mut child: Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if let Err(err) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    debug!("failed to send SIGTERM to {name} (pid {pid}): {err}");
                }
            }
            match time::timeout(STOP_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!("{name} exited with {status}");
                    return;
                }
                Ok(Err(err)) => {
                    debug!("failed to wait for {name}: {err}");
                    return;
                }
                Err(_) => {
                    warn!("{name} did not exit within {}s, killing", STOP_GRACE.as_secs());
                }
            }
        }
        if let Err(err) = child.kill().await {
            debug!("failed to kill {name}: {err}");
        }
    }

    /// Read one pipe to EOF, classifying every line. A reader returning does
    /// not by itself mark the subsystem dead; the monitor detects that.
    async fn read_stream<R>(&self, name: &str, stream: R, source: StreamSource)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!("{name} {source:?} pipe error: {err}");
                    break;
                }
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.handle_line(name, line, source).await;
        }
        trace!("{name} {source:?} reader finished");
    }

    async fn handle_line(&self, name: &str, line: &str, source: StreamSource) {
        let kind = demux::classify(line);
        if kind == LineKind::Heartbeat {
            self.registry
                .with(name, |sub| sub.last_heartbeat = Some(Instant::now()))
                .await;
            return;
        }
        let Some((level, msg)) = kind.into_level_msg(source) else {
            return;
        };
        if level == Severity::Debug {
            return;
        }
        if msg.starts_with(demux::COMMAND_PREFIX) {
            if self.stopping.load(Ordering::SeqCst) {
                return;
            }
            let tokens: Vec<String> = msg.split_whitespace().map(str::to_string).collect();
            if let Some(tx) = self.command_tx.get() {
                let _ = tx.send(tokens);
            }
            return;
        }
        if msg.starts_with(demux::TELEMETRY_PREFIX) {
            self.bus.publish(format!("TELEMETRY {msg}"));
            return;
        }
        level.log(&format!("[{name}] {msg}"));
        self.bus.publish(format!("TELEMETRY {level} [{name}]: {msg}"));
    }
}

/// Partition the registry into startup tiers, preserving insertion order
/// within each tier.
fn partition_tiers(subs: &IndexMap<String, Subsystem>) -> [Vec<String>; 3] {
    let mut tiers: [Vec<String>; 3] = Default::default();
    for sub in subs.values() {
        tiers[(sub.tier() - 1) as usize].push(sub.name.clone());
    }
    tiers
}
