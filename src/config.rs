//! Supervisor-level configuration.
//!
//! Loaded once at boot from `config.json5` at the platform root. Every field
//! has a default so a partial or missing file still yields a working
//! configuration. Key names match the file contract (`PORT_INTERPROCESS`,
//! `HEARTBEAT_INTERVAL`, ...).

use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct SupervisorConfig {
    /// Loopback port the telemetry bus publisher binds.
    pub port_interprocess: u16,
    /// Heartbeat emission cadence passed to children as `--heartbeat`, seconds.
    pub heartbeat_interval: f64,
    /// Liveness threshold, seconds. Strictly exceeding it marks a stall.
    pub heartbeat_timeout: f64,
    /// Grace between termination and relaunch, seconds.
    pub restart_delay: f64,
    /// Monitor scan cadence, seconds.
    pub monitor_interval: f64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            port_interprocess: 5555,
            heartbeat_interval: 10.0,
            heartbeat_timeout: 20.0,
            restart_delay: 2.0,
            monitor_interval: 5.0,
        }
    }
}

impl SupervisorConfig {
    /// Read the config file, falling back to defaults when it is absent or
    /// unparseable. A broken config file must not keep the rover down.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("no supervisor config at {}: {err}", path.display());
                return Self::default();
            }
        };
        match json5::from_str(&raw) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("failed to parse {}: {err}, using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.heartbeat_timeout)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs_f64(self.restart_delay)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs_f64(self.monitor_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.port_interprocess, 5555);
        assert_eq!(cfg.heartbeat_interval, 10.0);
        assert_eq!(cfg.heartbeat_timeout, 20.0);
        assert_eq!(cfg.restart_delay, 2.0);
        assert_eq!(cfg.monitor_interval, 5.0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: SupervisorConfig = json5::from_str(
            r#"{
                // operator bumped the liveness threshold for field testing
                HEARTBEAT_TIMEOUT: 45,
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.heartbeat_timeout, 45.0);
        assert_eq!(cfg.port_interprocess, 5555);
        assert_eq!(cfg.monitor_interval, 5.0);
    }

    #[test]
    fn test_empty_config_uses_all_defaults() {
        let cfg: SupervisorConfig = json5::from_str("{}").unwrap();
        assert_eq!(cfg.port_interprocess, 5555);
        assert_eq!(cfg.restart_delay, 2.0);
    }

    #[test]
    fn test_full_config() {
        let cfg: SupervisorConfig = json5::from_str(
            r#"{
                PORT_INTERPROCESS: 6000,
                HEARTBEAT_INTERVAL: 5,
                HEARTBEAT_TIMEOUT: 12.5,
                RESTART_DELAY: 1,
                MONITOR_INTERVAL: 2,
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.port_interprocess, 6000);
        assert_eq!(cfg.heartbeat_interval, 5.0);
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs_f64(12.5));
        assert_eq!(cfg.restart_delay(), Duration::from_secs(1));
        assert_eq!(cfg.monitor_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_missing_file() {
        let cfg = SupervisorConfig::load("/nonexistent/config.json5");
        assert_eq!(cfg.port_interprocess, 5555);
    }
}
