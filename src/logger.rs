//! Console logging for the supervisor.
//!
//! The platform distinguishes six severities: DEBUG, INFO, SUCCESS, WARNING,
//! ERROR, CRITICAL. The `log` crate only has five fixed levels, so SUCCESS
//! and CRITICAL ride on dedicated targets that the sink renders specially.

use crate::env;
use console::style;
use log::{Level, LevelFilter, Log, Metadata, Record};

pub const SUCCESS_TARGET: &str = "spot::success";
pub const CRITICAL_TARGET: &str = "spot::critical";

/// Log at the SUCCESS severity (between INFO and WARNING).
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        log::info!(target: $crate::logger::SUCCESS_TARGET, $($arg)*)
    };
}

/// Log at the CRITICAL severity (above ERROR).
#[macro_export]
macro_rules! critical {
    ($($arg:tt)*) => {
        log::error!(target: $crate::logger::CRITICAL_TARGET, $($arg)*)
    };
}

/// Severity of a child-originated or operator-facing line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Severity {
    Debug,
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Parse a child-declared level label. Unrecognised labels fall back to
    /// INFO, matching how unlabelled lines are treated.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Severity::Info)
    }

    /// Emit `msg` through the supervisor log at this severity.
    pub fn log(&self, msg: &str) {
        match self {
            Severity::Debug => debug!("{msg}"),
            Severity::Info => info!("{msg}"),
            Severity::Success => success!("{msg}"),
            Severity::Warning => warn!("{msg}"),
            Severity::Error => error!("{msg}"),
            Severity::Critical => critical!("{msg}"),
        }
    }
}

struct ConsoleLogger {
    filter: LevelFilter,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let label = match record.target() {
            SUCCESS_TARGET => style("SUCCESS").green().to_string(),
            CRITICAL_TARGET => style("CRITICAL").red().bold().to_string(),
            _ => match record.level() {
                Level::Error => style("ERROR").red().to_string(),
                Level::Warn => style("WARNING").yellow().to_string(),
                Level::Info => style("INFO").cyan().to_string(),
                Level::Debug => style("DEBUG").dim().to_string(),
                Level::Trace => style("TRACE").dim().to_string(),
            },
        };
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        eprintln!("{now} {label} {}", record.args());
    }

    fn flush(&self) {}
}

pub fn init() {
    let logger = ConsoleLogger { filter: *env::SPOT_LOG };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(*env::SPOT_LOG);
    }
}
