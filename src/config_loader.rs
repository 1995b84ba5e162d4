//! Subsystem discovery.
//!
//! Each immediate child directory of the subsystems root that carries an
//! executable `process.py` entry and a `config.json5` (or `config.json`)
//! becomes one registry record. Anything malformed is skipped with a warning
//! so a single bad subsystem cannot keep the rover from booting.

use crate::error::ConfigError;
use crate::subsystem::Subsystem;
use indexmap::IndexMap;
use miette::IntoDiagnostic;
use serde_json::Value;
use std::path::Path;

pub const ENTRY_FILE: &str = "process.py";

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SubsystemConfig {
    /// Overrides the directory-derived name.
    name: Option<String>,
    /// Negative disables the subsystem. Missing means lowest tier.
    priority: Option<i64>,
    /// Flag-name to value mapping, flattened in declared order.
    args: serde_json::Map<String, Value>,
}

const DEFAULT_PRIORITY: i64 = 100;

/// Scan `root` and materialise the subsystem registry.
///
/// Only an unreadable root is fatal. Per-directory problems (missing entry,
/// missing or unparseable config, negative priority) skip that directory;
/// a duplicate name keeps the first definition.
pub fn load_subsystems(root: &Path) -> crate::Result<IndexMap<String, Subsystem>> {
    let mut dirs: Vec<_> = std::fs::read_dir(root)
        .into_diagnostic()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut subsystems: IndexMap<String, Subsystem> = IndexMap::new();

    for dir in dirs {
        let entry = dir.join(ENTRY_FILE);
        if !entry.is_file() {
            warn!("{}", ConfigError::MissingEntry { path: entry });
            continue;
        }

        let config = match read_config(&dir) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };

        let priority = config.priority.unwrap_or(DEFAULT_PRIORITY);
        let name = config.name.unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });

        if priority < 0 {
            warn!("subsystem {name} disabled (priority {priority}), skipping");
            continue;
        }

        if subsystems.contains_key(&name) {
            error!("{}", ConfigError::DuplicateName { name, dir });
            continue;
        }

        let entry = entry.canonicalize().unwrap_or(entry);
        let extra_args = flatten_args(&config.args);
        info!("discovered subsystem {name} (priority {priority})");
        subsystems.insert(
            name.clone(),
            Subsystem::new(name, priority, entry, extra_args),
        );
    }

    Ok(subsystems)
}

fn read_config(dir: &Path) -> Result<SubsystemConfig, ConfigError> {
    let json5_path = dir.join("config.json5");
    if json5_path.is_file() {
        let raw = std::fs::read_to_string(&json5_path).map_err(|err| ConfigError::Parse {
            path: json5_path.clone(),
            details: Some(err.to_string()),
        })?;
        return json5::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: json5_path,
            details: Some(err.to_string()),
        });
    }

    let json_path = dir.join("config.json");
    if json_path.is_file() {
        let raw = std::fs::read_to_string(&json_path).map_err(|err| ConfigError::Parse {
            path: json_path.clone(),
            details: Some(err.to_string()),
        })?;
        return serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: json_path,
            details: Some(err.to_string()),
        });
    }

    Err(ConfigError::MissingConfig {
        dir: dir.to_path_buf(),
    })
}

/// Flatten an `args` mapping into command-line tokens.
///
/// bool: the flag alone when true, nothing when false. Array: the flag
/// repeated once per element, in element order. Null: nothing. Any other
/// value: the flag followed by its stringified form. Mapping order is the
/// declared order.
pub fn flatten_args(args: &serde_json::Map<String, Value>) -> Vec<String> {
    let mut tokens = Vec::new();
    for (flag, value) in args {
        match value {
            Value::Null => {}
            Value::Bool(true) => tokens.push(flag.clone()),
            Value::Bool(false) => {}
            Value::Array(items) => {
                for item in items {
                    tokens.push(flag.clone());
                    tokens.push(stringify(item));
                }
            }
            other => {
                tokens.push(flag.clone());
                tokens.push(stringify(other));
            }
        }
    }
    tokens
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
