//! Child output classification.
//!
//! Every line a child writes is one of: a heartbeat pulse, a structured JSON
//! log record, or plain text. Classification is a single precedence-ordered
//! match; routing of the classified line lives with the stream readers in
//! the process manager.

use crate::logger::Severity;
use serde_json::Value;

/// Leading token of an inline operator command.
pub const COMMAND_PREFIX: &str = "SYSTEM CMD";
/// Leading token of a telemetry envelope carried in a log `msg`.
pub const TELEMETRY_PREFIX: &str = "JSON ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    /// Severity assumed for unstructured lines on this pipe.
    pub fn default_severity(self) -> Severity {
        match self {
            StreamSource::Stdout => Severity::Info,
            StreamSource::Stderr => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Heartbeat,
    Structured { level: Severity, msg: String },
    Plain { msg: String },
}

impl LineKind {
    /// Collapse to (severity, message), deriving the severity of plain text
    /// from the pipe it arrived on. Heartbeats carry no message.
    pub fn into_level_msg(self, source: StreamSource) -> Option<(Severity, String)> {
        match self {
            LineKind::Heartbeat => None,
            LineKind::Structured { level, msg } => Some((level, msg)),
            LineKind::Plain { msg } => Some((source.default_severity(), msg)),
        }
    }
}

/// Classify one trimmed line of child output.
pub fn classify(line: &str) -> LineKind {
    if line == "HEARTBEAT" {
        return LineKind::Heartbeat;
    }
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line) {
        let msg = obj
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let level = obj
            .get("level")
            .and_then(Value::as_str)
            .map(Severity::from_label)
            .unwrap_or(Severity::Info);
        return LineKind::Structured { level, msg };
    }
    LineKind::Plain {
        msg: line.to_string(),
    }
}
