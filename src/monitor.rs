//! Liveness monitoring and restart scheduling.
//!
//! One scan loop walks the registry in ascending priority order so critical
//! infrastructure is revived first. Restarts are delayed tasks independent of
//! the loop; each one re-checks for an operator stop before acting.

use crate::config::SupervisorConfig;
use crate::process_manager::ProcessManager;
use crate::subsystem::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{self, Instant};

pub struct Monitor {
    registry: Registry,
    pm: ProcessManager,
    config: Arc<SupervisorConfig>,
}

enum Action {
    Nothing,
    Schedule,
    KillAndSchedule,
}

impl Monitor {
    pub fn new(registry: Registry, pm: ProcessManager, config: Arc<SupervisorConfig>) -> Self {
        Self {
            registry,
            pm,
            config,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Monitor started");
        let mut interval = time::interval(self.config.monitor_interval());
        loop {
            select! {
                _ = interval.tick() => self.scan().await,
                _ = shutdown.changed() => break,
            }
        }
        info!("Monitor stopped");
    }

    async fn scan(&self) {
        let now = Instant::now();
        let names = {
            let subs = self.registry.lock().await;
            let mut ranked: Vec<(i64, String)> = subs
                .values()
                .map(|sub| (sub.priority_rank, sub.name.clone()))
                .collect();
            // stable sort keeps insertion order as the tie-break
            ranked.sort_by_key(|(rank, _)| *rank);
            ranked
        };
        for (_, name) in names {
            self.check_subsystem(&name, now).await;
        }
    }

    async fn check_subsystem(&self, name: &str, now: Instant) {
        let timeout = self.config.heartbeat_timeout();
        let action = self
            .registry
            .with(name, |sub| {
                if sub.intentionally_stopped {
                    return Action::Nothing;
                }
                match sub.process.as_mut() {
                    None => {
                        if sub.restart_pending {
                            Action::Nothing
                        } else {
                            Action::Schedule
                        }
                    }
                    Some(child) => match child.try_wait() {
                        Ok(Some(status)) => {
                            warn!("{name} exited with status {status}");
                            sub.process = None;
                            Action::Schedule
                        }
                        Ok(None) => {
                            let expired = sub
                                .last_heartbeat
                                .is_some_and(|last| heartbeat_expired(now, last, timeout));
                            if expired {
                                warn!("Heartbeat timeout for {name}");
                                Action::KillAndSchedule
                            } else {
                                Action::Nothing
                            }
                        }
                        Err(err) => {
                            debug!("failed to poll {name}: {err}");
                            Action::Nothing
                        }
                    },
                }
            })
            .await
            .unwrap_or(Action::Nothing);

        match action {
            Action::Nothing => {}
            Action::Schedule => self.schedule_restart(name).await,
            Action::KillAndSchedule => {
                self.pm.kill(name).await;
                self.schedule_restart(name).await;
            }
        }
    }

    /// Queue a delayed relaunch unless one is already pending. The task
    /// clears the pending flag before acting and aborts if the operator
    /// stopped the subsystem during the delay.
    async fn schedule_restart(&self, name: &str) {
        let scheduled = self
            .registry
            .with(name, |sub| {
                if sub.restart_pending || sub.intentionally_stopped {
                    false
                } else {
                    sub.restart_pending = true;
                    true
                }
            })
            .await
            .unwrap_or(false);
        if !scheduled {
            return;
        }

        let pm = self.pm.clone();
        let registry = self.registry.clone();
        let delay = self.config.restart_delay();
        let name = name.to_string();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let stopped = registry
                .with(&name, |sub| {
                    sub.restart_pending = false;
                    sub.intentionally_stopped
                })
                .await
                .unwrap_or(true);
            if stopped {
                return;
            }
            warn!("Restarting {name}");
            // failures are logged by start(); the next scan retries
            let _ = pm.start(&name).await;
        });
    }
}

/// Strictly greater than the threshold: a heartbeat aged exactly
/// `timeout` is still considered live.
fn heartbeat_expired(now: Instant, last: Instant, timeout: Duration) -> bool {
    now.duration_since(last) > timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_expiry_boundary() {
        let timeout = Duration::from_secs(20);
        let last = Instant::now();

        assert!(!heartbeat_expired(last + Duration::from_secs(19), last, timeout));
        // exactly at the threshold is not yet a timeout
        assert!(!heartbeat_expired(last + timeout, last, timeout));
        assert!(heartbeat_expired(
            last + timeout + Duration::from_millis(1),
            last,
            timeout
        ));
    }

    #[test]
    fn test_heartbeat_from_future_not_expired() {
        // duration_since saturates to zero when last is ahead of now
        let timeout = Duration::from_secs(20);
        let last = Instant::now() + Duration::from_secs(5);
        assert!(!heartbeat_expired(Instant::now(), last, timeout));
    }
}
