#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Entry that pulses a heartbeat every 200ms, forever.
pub const HEARTBEAT_ENTRY: &str = "#!/bin/sh\nwhile true; do echo HEARTBEAT; sleep 0.2; done\n";

/// Entry that never pulses: prints one line, then hangs.
pub const SILENT_ENTRY: &str = "#!/bin/sh\necho started\nexec sleep 600\n";

/// Entry that exits almost immediately.
pub const SHORT_LIVED_ENTRY: &str = "#!/bin/sh\necho HEARTBEAT\nsleep 0.1\n";

/// Disposable platform root with a `subsystems/` directory.
pub struct PlatformRoot {
    temp_dir: TempDir,
}

impl PlatformRoot {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("subsystems")).unwrap();
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn subsystems_dir(&self) -> PathBuf {
        self.temp_dir.path().join("subsystems")
    }

    pub fn write_supervisor_config(&self, content: &str) {
        fs::write(self.root().join("config.json5"), content).unwrap();
    }

    /// Create a subsystem directory with an executable entry stub and the
    /// given config file.
    pub fn add_subsystem(&self, dir_name: &str, config_file: &str, config: &str, entry: &str) {
        let dir = self.subsystems_dir().join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(config_file), config).unwrap();
        let entry_path = dir.join("process.py");
        fs::write(&entry_path, entry).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&entry_path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// A subsystem directory with a config but no entry file.
    pub fn add_subsystem_without_entry(&self, dir_name: &str, config: &str) {
        let dir = self.subsystems_dir().join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json5"), config).unwrap();
    }

    /// A subsystem directory with an entry but no config file.
    pub fn add_subsystem_without_config(&self, dir_name: &str) {
        let dir = self.subsystems_dir().join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("process.py"), SILENT_ENTRY).unwrap();
    }
}
