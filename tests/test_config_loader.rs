mod common;

use common::{PlatformRoot, SILENT_ENTRY};
use spot_supervisor::config_loader::load_subsystems;
use spot_supervisor::subsystem::tier;

#[test]
fn test_discovery_with_json5_config() {
    let root = PlatformRoot::new();
    root.add_subsystem(
        "drive",
        "config.json5",
        r#"{
            // motor controllers must be up before the arm
            priority: 10,
            args: {
                "--bus": "can0",
                "--wheel": [0, 1, 2, 3],
                "--calibrate": true,
                "--simulate": false,
                "--offset": null,
            },
        }"#,
        SILENT_ENTRY,
    );

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert_eq!(subs.len(), 1);

    let drive = &subs["drive"];
    assert_eq!(drive.name, "drive");
    assert_eq!(drive.priority_rank, 10);
    assert_eq!(drive.tier(), 2);
    assert!(drive.path.ends_with("process.py"));
    assert_eq!(
        drive.extra_args,
        vec![
            "--bus", "can0", "--wheel", "0", "--wheel", "1", "--wheel", "2", "--wheel", "3",
            "--calibrate",
        ]
    );
    assert!(drive.process.is_none());
    assert!(drive.last_heartbeat.is_none());
    assert!(!drive.restart_pending);
    assert!(!drive.intentionally_stopped);
}

#[test]
fn test_discovery_name_override() {
    let root = PlatformRoot::new();
    root.add_subsystem(
        "drive-v2",
        "config.json5",
        r#"{ name: "drive", priority: 5 }"#,
        SILENT_ENTRY,
    );

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert!(subs.contains_key("drive"));
    assert!(!subs.contains_key("drive-v2"));
}

#[test]
fn test_discovery_json_fallback() {
    let root = PlatformRoot::new();
    root.add_subsystem(
        "arm",
        "config.json",
        r#"{ "priority": 20, "args": { "--rate": 50 } }"#,
        SILENT_ENTRY,
    );

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert_eq!(subs["arm"].priority_rank, 20);
    assert_eq!(subs["arm"].extra_args, vec!["--rate", "50"]);
}

#[test]
fn test_negative_priority_is_skipped() {
    let root = PlatformRoot::new();
    root.add_subsystem(
        "excavator",
        "config.json5",
        r#"{ priority: -1 }"#,
        SILENT_ENTRY,
    );
    root.add_subsystem("drive", "config.json5", r#"{ priority: 10 }"#, SILENT_ENTRY);

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert!(!subs.contains_key("excavator"));
    assert!(subs.contains_key("drive"));
}

#[test]
fn test_missing_entry_is_skipped() {
    let root = PlatformRoot::new();
    root.add_subsystem_without_entry("ghost", r#"{ priority: 1 }"#);

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert!(subs.is_empty());
}

#[test]
fn test_missing_config_is_skipped() {
    let root = PlatformRoot::new();
    root.add_subsystem_without_config("bare");

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert!(subs.is_empty());
}

#[test]
fn test_unparseable_config_is_skipped() {
    let root = PlatformRoot::new();
    root.add_subsystem("broken", "config.json5", "{ priority: ", SILENT_ENTRY);
    root.add_subsystem("drive", "config.json5", r#"{ priority: 10 }"#, SILENT_ENTRY);

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert_eq!(subs.len(), 1);
    assert!(subs.contains_key("drive"));
}

#[test]
fn test_duplicate_name_keeps_first() {
    let root = PlatformRoot::new();
    // directories scan in sorted order, so a_drive wins the name
    root.add_subsystem(
        "a_drive",
        "config.json5",
        r#"{ name: "drive", priority: 1 }"#,
        SILENT_ENTRY,
    );
    root.add_subsystem(
        "b_drive",
        "config.json5",
        r#"{ name: "drive", priority: 42 }"#,
        SILENT_ENTRY,
    );

    let subs = load_subsystems(&root.subsystems_dir()).unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs["drive"].priority_rank, 1);
}

#[test]
fn test_unreadable_root_is_fatal() {
    let root = PlatformRoot::new();
    assert!(load_subsystems(&root.root().join("no-such-dir")).is_err());
}

#[test]
fn test_tier_banding() {
    assert_eq!(tier(0), 1);
    assert_eq!(tier(9), 1);
    assert_eq!(tier(10), 2);
    assert_eq!(tier(99), 2);
    assert_eq!(tier(100), 3);
}
