//! Diagnostic error types for subsystem discovery and operator commands.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading subsystem definitions.
///
/// All of these are recoverable at boot: the offending subsystem is skipped
/// and loading continues.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("duplicate subsystem name '{name}' in {}", dir.display())]
    #[diagnostic(
        code(spot::config::duplicate_name),
        help("subsystem names must be unique; the first definition is kept")
    )]
    DuplicateName { name: String, dir: PathBuf },

    #[error("no entry file at {}", path.display())]
    #[diagnostic(
        code(spot::config::missing_entry),
        help("each subsystem directory needs an executable process.py entry")
    )]
    MissingEntry { path: PathBuf },

    #[error("no config file in {}", dir.display())]
    #[diagnostic(
        code(spot::config::missing_config),
        help("add a config.json5 (or config.json) next to the entry file")
    )]
    MissingConfig { dir: PathBuf },

    #[error("failed to parse {}", path.display())]
    #[diagnostic(code(spot::config::parse_error))]
    Parse {
        path: PathBuf,
        #[help]
        details: Option<String>,
    },
}

/// Errors reported back to the operator over the command channel.
#[derive(Debug, Error, Diagnostic)]
pub enum CommandError {
    #[error("No command specified")]
    #[diagnostic(code(spot::cmd::no_command))]
    NoCommand,

    #[error("No process specified")]
    #[diagnostic(code(spot::cmd::no_process))]
    NoProcess,

    #[error("Unknown command: {0}")]
    #[diagnostic(code(spot::cmd::unknown), help("send 'SYSTEM CMD help' for usage"))]
    Unknown(String),

    #[error("Process '{0}' not found")]
    #[diagnostic(code(spot::cmd::not_found))]
    NotFound(String),

    #[error("{0} already running. Use 'restart {0}' instead.")]
    #[diagnostic(code(spot::cmd::already_running))]
    AlreadyRunning(String),

    #[error("BLOCKED: Stopping telemetry is irrecoverable. Use 'restart telemetry' instead.")]
    #[diagnostic(
        code(spot::cmd::stop_blocked),
        help("telemetry is the operator's only feedback channel")
    )]
    StopBlocked,
}
