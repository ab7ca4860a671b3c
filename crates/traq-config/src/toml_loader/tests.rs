//! Tests for TOML config loading.

use super::*;
use crate::schema::LogLevel;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_traq_presence_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, traq_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence.toml");
    std::fs::write(
        &path,
        r#"
[presence]
heartbeat_timeout_ms = 8000

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.presence.heartbeat_timeout_ms, 8000);
    assert_eq!(config.logging.level, LogLevel::Debug);
    // Defaults preserved
    assert_eq!(config.presence.heartbeat_tick_ms, 500);
    assert_eq!(config.presence.viewer_gc_interval_secs, 300);
    assert_eq!(config.bus.capacity, 1024);
}

#[test]
fn load_empty_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence.toml");
    std::fs::write(&path, "").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.presence.heartbeat_timeout_ms, 5000);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, traq_common::ConfigError::ParseError(_)));
}

#[test]
fn load_wrong_type_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence.toml");
    std::fs::write(&path, "[bus]\ncapacity = \"lots\"\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse TOML"));
}

#[test]
fn load_config_with_invalid_values_is_returned_as_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presence.toml");
    std::fs::write(&path, "[bus]\ncapacity = 1\n").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.bus.capacity, 1);
    assert!(crate::validation::validate(&config).is_err());
}

#[test]
fn default_config_path_ends_with_presence_toml() {
    if let Ok(path) = default_config_path() {
        assert!(path.ends_with("traq/presence.toml"));
    }
}
