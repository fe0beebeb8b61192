//! Integration tests for configuration parsing
//!
//! Tests configuration file loading, including:
//! - Minimal and full configuration files
//! - Defaults for missing fields
//! - Invalid configuration handling

use netmd::{ExchangeSettings, ProbeConfig, load_config};
use std::fs;
use std::time::Duration;

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"

[exchange]
poll_timeout_ms = 500
send_timeout_ms = 2000
recv_timeout_ms = 1500
send_poll_attempts = 2
recv_poll_attempts = 10
busy_rounds = 5
backoff_ms = 100
exchange_timeout_ms = 10000
"#;

#[test]
fn test_empty_config_uses_defaults() {
    let config = ProbeConfig::from_toml("").unwrap();
    assert_eq!(config, ProbeConfig::default());
}

#[test]
fn test_full_config() {
    let config = ProbeConfig::from_toml(FULL_CONFIG).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.exchange.poll_timeout(), Duration::from_millis(500));
    assert_eq!(config.exchange.send_timeout(), Duration::from_secs(2));
    assert_eq!(config.exchange.recv_timeout(), Duration::from_millis(1500));
    assert_eq!(config.exchange.send_poll_attempts, 2);
    assert_eq!(config.exchange.recv_poll_attempts, 10);
    assert_eq!(config.exchange.busy_rounds, 5);
    assert_eq!(config.exchange.backoff(), Duration::from_millis(100));
    assert_eq!(config.exchange.exchange_timeout(), Duration::from_secs(10));
}

#[test]
fn test_partial_exchange_section() {
    let config = ProbeConfig::from_toml("[exchange]\nrecv_poll_attempts = 60\n").unwrap();

    assert_eq!(config.exchange.recv_poll_attempts, 60);
    assert_eq!(
        config.exchange.busy_rounds,
        ExchangeSettings::default().busy_rounds
    );
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_log_level() {
    assert!(ProbeConfig::from_toml("[logging]\nlevel = \"loud\"\n").is_err());
}

#[test]
fn test_zero_budget_rejected() {
    assert!(ProbeConfig::from_toml("[exchange]\nbusy_rounds = 0\n").is_err());
    assert!(ProbeConfig::from_toml("[exchange]\npoll_timeout_ms = 0\n").is_err());
}

#[test]
fn test_malformed_toml() {
    assert!(ProbeConfig::from_toml("[exchange\n").is_err());
    assert!(ProbeConfig::from_toml("[exchange]\nbackoff_ms = \"soon\"\n").is_err());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("netmd.toml");

    let mut config = ProbeConfig::default();
    config.exchange.busy_rounds = 12;
    config.save(&path).unwrap();

    let loaded = ProbeConfig::load(Some(path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_config_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("netmd.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let config = load_config(path.to_str().unwrap()).unwrap();
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ProbeConfig::load(Some(dir.path().join("missing.toml"))).is_err());
}
