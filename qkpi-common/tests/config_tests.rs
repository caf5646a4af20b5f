//! Tests for configuration loading and root folder resolution
//!
//! Tests touching environment variables are marked `#[serial]` so they do
//! not race each other.

use qkpi_common::config::{
    database_path, load_toml_config, parse_toml_config, resolve_root_folder, TomlConfig,
};
use qkpi_common::non_quality_cost::DEFAULT_NQC_THRESHOLD;
use qkpi_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const TEST_ENV_VAR: &str = "QKPI_TEST_ROOT_FOLDER";

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert!(config.root_folder.is_none());
    assert_eq!(config.kpi.nqc_default_threshold, DEFAULT_NQC_THRESHOLD);
    assert!(!config.kpi.strict_scopes);
    assert!(config.kpi.seed_default_thresholds);
}

#[test]
fn test_partial_kpi_table_keeps_other_defaults() {
    let config = parse_toml_config(
        r#"
        root_folder = "/srv/qkpi"

        [kpi]
        strict_scopes = true
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/qkpi")));
    assert!(config.kpi.strict_scopes);
    assert_eq!(config.kpi.nqc_default_threshold, DEFAULT_NQC_THRESHOLD);
    assert!(config.kpi.seed_default_thresholds);
}

#[test]
fn test_negative_default_threshold_rejected() {
    let result = parse_toml_config("[kpi]\nnqc_default_threshold = -2.0\n");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "bind_addr = \"0.0.0.0\"\n[kpi]\nnqc_default_threshold = 12.5\n").unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.bind_addr.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.kpi.nqc_default_threshold, 12.5);
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let result = load_toml_config(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(TEST_ENV_VAR, "/tmp/qkpi-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qkpi-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/qkpi-cli")), TEST_ENV_VAR, &config);
    assert_eq!(root, PathBuf::from("/tmp/qkpi-cli"));

    env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(TEST_ENV_VAR, "/tmp/qkpi-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qkpi-toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, TEST_ENV_VAR, &config);
    assert_eq!(root, PathBuf::from("/tmp/qkpi-env"));

    env::remove_var(TEST_ENV_VAR);
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(TEST_ENV_VAR);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qkpi-toml")),
        ..Default::default()
    };
    assert_eq!(
        resolve_root_folder(None, TEST_ENV_VAR, &config),
        PathBuf::from("/tmp/qkpi-toml")
    );

    let fallback = resolve_root_folder(None, TEST_ENV_VAR, &TomlConfig::default());
    assert!(!fallback.as_os_str().is_empty());
    assert!(fallback.to_string_lossy().contains("qkpi"));
}

#[test]
fn test_database_path() {
    assert_eq!(
        database_path(Path::new("/srv/qkpi")),
        PathBuf::from("/srv/qkpi/qkpi.db")
    );
}
