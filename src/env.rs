use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;

/// Platform root. Holds `config.json5` and the `subsystems/` directory.
pub static SPOT_DIR: Lazy<PathBuf> =
    Lazy::new(|| var_path("SPOT_DIR").unwrap_or_else(|| current_dir().unwrap_or_default()));

pub static SPOT_SUBSYSTEMS_DIR: Lazy<PathBuf> =
    Lazy::new(|| var_path("SPOT_SUBSYSTEMS_DIR").unwrap_or_else(|| SPOT_DIR.join("subsystems")));

pub static SPOT_CONFIG_FILE: Lazy<PathBuf> =
    Lazy::new(|| var_path("SPOT_CONFIG_FILE").unwrap_or_else(|| SPOT_DIR.join("config.json5")));

pub static SPOT_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("SPOT_LOG").unwrap_or(log::LevelFilter::Info));

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from).ok()
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}
