//! Unit tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate DLM_ROOT_FOLDER are marked with #[serial]
//! so they never race each other on the process environment.

use dlm_common::config::{
    load_or_default, load_toml_config, CompiledDefaults, RootFolderInitializer,
    RootFolderResolver, TomlConfig, DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.bind_address, "127.0.0.1:5780");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new(None, &TomlConfig::default());
    let root = resolver.resolve();

    assert_eq!(root, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let resolver = RootFolderResolver::new(Some(PathBuf::from("/from/cli")), &TomlConfig::default());
    assert_eq!(resolver.resolve(), PathBuf::from("/from/cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_environment_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new(None, &toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/from/env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };
    let resolver = RootFolderResolver::new(None, &toml);
    assert_eq!(resolver.resolve(), PathBuf::from("/from/toml"));
}

#[test]
fn test_initializer_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join(DATABASE_FILE_NAME));
}

#[test]
fn test_full_toml_parses_market_section() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dlm-market.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/dlm"

[logging]
level = "debug"

[server]
bind_address = "0.0.0.0:9000"

[market]
required_votes = 5
majority_threshold = 3
labeling_pool_percent = 80
verification_reward_factor = 0.25
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/dlm")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.server.bind_address.as_deref(), Some("0.0.0.0:9000"));
    assert_eq!(config.market.required_votes, Some(5));
    assert_eq!(config.market.majority_threshold, Some(3));
    assert_eq!(config.market.labeling_pool_percent, Some(80));
    assert_eq!(config.market.verification_reward_factor, Some(0.25));
    assert_eq!(config.market.signer_key, None);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dlm-market.toml");
    std::fs::write(&path, "root_folder = \"/srv/dlm\"\n").unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.market, Default::default());
}

#[test]
fn test_missing_toml_degrades_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    assert_eq!(load_or_default(Some(&path)), TomlConfig::default());
    assert_eq!(load_or_default(None), TomlConfig::default());
}

#[test]
fn test_malformed_toml_degrades_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[market\nrequired_votes = ").unwrap();

    assert!(load_toml_config(&path).is_err());
    assert_eq!(load_or_default(Some(&path)), TomlConfig::default());
}
