//! Inline operator commands.
//!
//! Operators steer the supervisor through `SYSTEM CMD ...` lines carried on
//! any child's log channel. Token vectors arrive on an unbounded channel and
//! are handled one at a time, which keeps the restart-all confirmation
//! protocol deterministic even when several children relay commands at once.

use crate::bus::TelemetryPublisher;
use crate::error::CommandError;
use crate::logger::Severity;
use crate::process_manager::ProcessManager;
use crate::subsystem::Registry;
use tokio::sync::{mpsc, watch};

/// The one subsystem the operator may never stop: it carries their replies.
const PROTECTED_SUBSYSTEM: &str = "telemetry";

const HELP: &str = "Available commands:
start <process>          - Start a subsystem
stop <process>           - Stop a subsystem
restart <process>        - Restart a subsystem
restart-all              - Restart the supervisor process
help                     - Show this help message
Notes:
- 'telemetry' cannot be stopped manually.
- Use 'restart-all' with caution; confirm with 'y'.";

/// A parsed operator command (everything after `SYSTEM CMD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Restart(String),
    Stop(String),
    Start(String),
    RestartAll,
    Help,
}

impl Command {
    pub fn parse(tokens: &[String]) -> Result<Command, CommandError> {
        let Some(subcmd) = tokens.first() else {
            return Err(CommandError::NoCommand);
        };
        let name = || {
            tokens
                .get(1)
                .cloned()
                .ok_or(CommandError::NoProcess)
        };
        match subcmd.as_str() {
            "restart" => Ok(Command::Restart(name()?)),
            "stop" => Ok(Command::Stop(name()?)),
            "start" => Ok(Command::Start(name()?)),
            "restart-all" => Ok(Command::RestartAll),
            "help" => Ok(Command::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub struct CommandHandler {
    registry: Registry,
    pm: ProcessManager,
    bus: TelemetryPublisher,
    shutdown: watch::Sender<bool>,
    restart_all_pending: bool,
}

impl CommandHandler {
    pub fn new(
        registry: Registry,
        pm: ProcessManager,
        bus: TelemetryPublisher,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            registry,
            pm,
            bus,
            shutdown,
            restart_all_pending: false,
        }
    }

    /// Drain the command channel until the senders are gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Vec<String>>) {
        while let Some(tokens) = rx.recv().await {
            self.handle(&tokens).await;
        }
    }

    /// Handle one raw token vector, e.g. `["SYSTEM", "CMD", "restart", "drive"]`.
    pub async fn handle(&mut self, tokens: &[String]) {
        if tokens.len() < 3 {
            self.reply(Severity::Error, &CommandError::NoCommand.to_string());
            return;
        }
        // a pending restart-all consumes the next command as its answer
        if self.restart_all_pending {
            self.confirm_restart_all(&tokens[2]);
            return;
        }
        match Command::parse(&tokens[2..]) {
            Ok(cmd) => self.dispatch(cmd).await,
            Err(err) => self.reply(Severity::Error, &err.to_string()),
        }
    }

    async fn dispatch(&mut self, cmd: Command) {
        match cmd {
            Command::Restart(name) => self.restart(&name).await,
            Command::Stop(name) => self.stop(&name).await,
            Command::Start(name) => self.start(&name).await,
            Command::RestartAll => {
                self.restart_all_pending = true;
                self.reply(
                    Severity::Warning,
                    "WARNING: restart-all will terminate supervisor. \
                     Systemd must restart it. Confirm? [y/n]",
                );
            }
            Command::Help => self.reply(Severity::Info, HELP),
        }
    }

    async fn restart(&self, name: &str) {
        if !self.registry.contains(name).await {
            self.reply_err(CommandError::NotFound(name.to_string()));
            return;
        }
        self.pm.stop(name).await;
        if let Err(err) = self.pm.start(name).await {
            self.reply(Severity::Error, &format!("Failed to start {name}: {err}"));
            return;
        }
        self.reply(Severity::Warning, &format!("Restarted {name}"));
    }

    async fn stop(&self, name: &str) {
        if name == PROTECTED_SUBSYSTEM {
            self.reply_err(CommandError::StopBlocked);
            return;
        }
        if !self.registry.contains(name).await {
            self.reply_err(CommandError::NotFound(name.to_string()));
            return;
        }
        self.pm.stop(name).await;
        self.reply(Severity::Warning, &format!("Stopped {name}"));
    }

    async fn start(&self, name: &str) {
        if !self.registry.contains(name).await {
            self.reply_err(CommandError::NotFound(name.to_string()));
            return;
        }
        if self.pm.is_running(name).await {
            self.reply_err(CommandError::AlreadyRunning(name.to_string()));
            return;
        }
        match self.pm.start(name).await {
            Ok(()) => self.reply(Severity::Warning, &format!("Started {name}")),
            Err(err) => self.reply(Severity::Error, &format!("Failed to start {name}: {err}")),
        }
    }

    fn confirm_restart_all(&mut self, answer: &str) {
        self.restart_all_pending = false;
        if answer.eq_ignore_ascii_case("y") {
            self.reply(Severity::Critical, "Shutting down supervisor...");
            let _ = self.shutdown.send(true);
        } else {
            self.reply(Severity::Info, "Restart-all cancelled");
        }
    }

    fn reply_err(&self, err: CommandError) {
        self.reply(Severity::Error, &err.to_string());
    }

    /// Every reply reaches both the supervisor console and the telemetry bus.
    fn reply(&self, level: Severity, msg: &str) {
        level.log(msg);
        self.bus.publish(format!("TELEMETRY {level} [supervisor]: {msg}"));
    }
}
