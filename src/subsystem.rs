use indexmap::IndexMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// One managed worker process.
///
/// The registry is the exclusive owner of these records; every other
/// component reaches them by name through [`Registry`].
#[derive(Debug)]
pub struct Subsystem {
    pub name: String,
    pub priority_rank: i64,
    /// Absolute path to the executable entry file.
    pub path: PathBuf,
    /// Flattened argument tokens appended after `--heartbeat <interval>`.
    pub extra_args: Vec<String>,
    /// Live child handle. Never references a reaped process.
    pub process: Option<Child>,
    /// Time of the most recent HEARTBEAT line, reset on every spawn.
    pub last_heartbeat: Option<Instant>,
    /// A delayed restart is queued but has not fired yet.
    pub restart_pending: bool,
    /// Operator stopped this subsystem; the monitor must not revive it.
    pub intentionally_stopped: bool,
}

impl Subsystem {
    pub fn new(name: String, priority_rank: i64, path: PathBuf, extra_args: Vec<String>) -> Self {
        Self {
            name,
            priority_rank,
            path,
            extra_args,
            process: None,
            last_heartbeat: None,
            restart_pending: false,
            intentionally_stopped: false,
        }
    }

    pub fn tier(&self) -> u8 {
        tier(self.priority_rank)
    }
}

impl Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Startup tier for a priority rank: 1 for 0-9, 2 for 10-99, 3 for 100+.
pub fn tier(priority_rank: i64) -> u8 {
    match priority_rank {
        0..=9 => 1,
        10..=99 => 2,
        _ => 3,
    }
}

/// Shared, insertion-ordered subsystem table.
///
/// All mutation happens under one mutex and no caller holds the guard across
/// an await point, which serialises every state transition.
#[derive(Clone, Default)]
pub struct Registry {
    subs: Arc<Mutex<IndexMap<String, Subsystem>>>,
}

impl Registry {
    pub fn new(subs: IndexMap<String, Subsystem>) -> Self {
        Self {
            subs: Arc::new(Mutex::new(subs)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, IndexMap<String, Subsystem>> {
        self.subs.lock().await
    }

    pub async fn names(&self) -> Vec<String> {
        self.subs.lock().await.keys().cloned().collect()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.subs.lock().await.contains_key(name)
    }

    /// Run `f` against the named record under the lock. Returns `None` when
    /// the name is unknown.
    pub async fn with<R>(&self, name: &str, f: impl FnOnce(&mut Subsystem) -> R) -> Option<R> {
        self.subs.lock().await.get_mut(name).map(f)
    }
}
