use std::io::Write;
use std::time::Duration;

use chrono::NaiveTime;
use tempfile::NamedTempFile;

use permwatch::config::{load_and_validate, load_or_default, ScheduleConfig};
use permwatch::errors::PermwatchError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn schedule_values_are_parsed() {
    let file = config_file(
        r#"
[schedule]
flush_interval = "5s"
rescan_at = "02:30"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.schedule.flush_interval, Duration::from_secs(5));
    assert_eq!(cfg.schedule.rescan_at, NaiveTime::from_hms_opt(2, 30, 0).unwrap());
}

#[test]
fn empty_file_gives_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.schedule, ScheduleConfig::default());
    assert_eq!(cfg.schedule.flush_interval, Duration::from_secs(60));
    assert_eq!(cfg.schedule.rescan_at, NaiveTime::from_hms_opt(4, 0, 0).unwrap());
}

#[test]
fn no_config_flag_gives_defaults() {
    let cfg = load_or_default(None).unwrap();
    assert_eq!(cfg.schedule, ScheduleConfig::default());
}

#[test]
fn zero_interval_is_a_config_error() {
    let file = config_file("[schedule]\nflush_interval = \"0s\"\n");

    match load_and_validate(file.path()) {
        Err(PermwatchError::ConfigError(msg)) => assert!(msg.contains("flush_interval")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn interval_too_large_to_represent_is_a_config_error() {
    let file = config_file("[schedule]\nflush_interval = \"18446744073709551615h\"\n");

    match load_and_validate(file.path()) {
        Err(PermwatchError::ConfigError(msg)) => assert!(msg.contains("too large")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn malformed_time_is_a_config_error() {
    let file = config_file("[schedule]\nrescan_at = \"4 o'clock\"\n");

    match load_and_validate(file.path()) {
        Err(PermwatchError::ConfigError(msg)) => assert!(msg.contains("rescan_at")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let file = config_file("[policy]\nmask = \"0755\"\n");

    assert!(matches!(
        load_and_validate(file.path()),
        Err(PermwatchError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_and_validate(dir.path().join("absent.toml")),
        Err(PermwatchError::IoError(_))
    ));
}
