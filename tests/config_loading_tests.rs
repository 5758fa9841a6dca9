//! Config loading and TOML/env override tests, exercising `Config::from_file`
//! against real files on disk rather than just `Config::default()`.

use quadcore::Config;
use std::fs;
use tempfile::TempDir;

#[test]
fn loads_execution_overrides_from_a_toml_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");

    fs::write(
        &config_path,
        r#"
[execution]
opt_level = 1
soft_limit = 5000
restricted = true

[execution.cache]
bind_cache_entries = 256
resolve_l2_entries = 1024

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = Config::from_file(config_path.to_str().unwrap()).unwrap();
    assert_eq!(config.execution.opt_level, 1);
    assert_eq!(config.execution.soft_limit, 5000);
    assert!(config.execution.restricted);
    assert_eq!(config.execution.cache.bind_cache_entries, 256);
    assert_eq!(config.execution.cache.resolve_l2_entries, 1024);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
}

#[test]
fn unspecified_fields_fall_back_to_their_defaults() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, "[execution]\nopt_level = 0\n").unwrap();

    let config = Config::from_file(config_path.to_str().unwrap()).unwrap();
    assert_eq!(config.execution.opt_level, 0);
    assert_eq!(config.execution.soft_limit, 1_000_000);
    assert!(!config.execution.restricted);
    assert_eq!(config.execution.cache.bind_cache_entries, 128);
}

#[test]
fn loading_a_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let nonexistent = temp.path().join("nonexistent.toml");
    let result = Config::from_file(nonexistent.to_str().unwrap());
    assert!(result.is_err(), "from_file() should fail when the config file and its required fields are both absent");
}
