use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use linkdupe::actions::LinkStrategy;
use linkdupe::config::{Config, ConfigError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.min_size, 16 * 1024);
    assert_eq!(config.batch_size, 256);
    assert_eq!(config.chunk_size, 4096);
    assert_eq!(config.strategy, LinkStrategy::Atomic);
    assert!(!config.dry_run);
    assert!(config.extension.is_none());
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
min_size = "1MiB"
batch_size = 64
chunk_size = "64KiB"
strategy = "delete-then-link"
dry_run = true
extension = ".iso"
"#,
    )
    .unwrap();

    let config: Config = Config::figment(None, Some(&config_path))
        .unwrap()
        .extract()
        .unwrap();

    assert_eq!(config.min_size, 1024 * 1024);
    assert_eq!(config.batch_size, 64);
    assert_eq!(config.chunk_size, 64 * 1024);
    assert_eq!(config.strategy, LinkStrategy::DeleteThenLink);
    assert!(config.dry_run);
    assert_eq!(config.extension.as_deref(), Some(".iso"));
}

#[test]
fn test_explicit_file_overrides_user_file() {
    let temp_dir = tempdir().unwrap();
    let user = temp_dir.path().join("user.toml");
    let explicit = temp_dir.path().join("explicit.toml");
    fs::write(&user, "batch_size = 10\nmin_size = 100\n").unwrap();
    fs::write(&explicit, "batch_size = 20\n").unwrap();

    let config: Config = Config::figment(Some(&user), Some(&explicit))
        .unwrap()
        .extract()
        .unwrap();

    assert_eq!(config.batch_size, 20);
    assert_eq!(config.min_size, 100);
}

#[test]
fn test_env_overrides_files() {
    let temp_dir = tempdir().unwrap();
    let explicit = temp_dir.path().join("explicit.toml");
    fs::write(&explicit, "batch_size = 20\nchunk_size = 1024\n").unwrap();

    // Prefix outside LINKDUPE_ so concurrent runs of the binary never see it.
    std::env::set_var("LDTEST_CONFIG_BATCH_SIZE", "7");
    std::env::set_var("LDTEST_CONFIG_MIN_SIZE", "2KiB");
    std::env::set_var("LDTEST_CONFIG_STRATEGY", "delete-then-link");

    let config: Config = Config::figment(None, Some(&explicit))
        .unwrap()
        .merge(Env::prefixed("LDTEST_CONFIG_"))
        .extract()
        .unwrap();

    assert_eq!(config.batch_size, 7);
    assert_eq!(config.min_size, 2048);
    assert_eq!(config.chunk_size, 1024);
    assert_eq!(config.strategy, LinkStrategy::DeleteThenLink);

    std::env::remove_var("LDTEST_CONFIG_BATCH_SIZE");
    std::env::remove_var("LDTEST_CONFIG_MIN_SIZE");
    std::env::remove_var("LDTEST_CONFIG_STRATEGY");
}

#[test]
fn test_missing_explicit_config() {
    let temp_dir = tempdir().unwrap();
    let err = Config::load(Some(&temp_dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_config_invalid_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "invalid = toml").unwrap();

    let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract();
    assert!(result.is_err());
}

#[test]
fn test_config_bad_value() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "strategy = \"copy\"\n").unwrap();

    let result: Result<Config, _> = Config::figment(None, Some(&config_path))
        .unwrap()
        .extract();
    assert!(result.is_err());
}

#[test]
fn test_config_round_trips_through_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let config = Config {
        batch_size: 12,
        extension: Some(".img".to_string()),
        ..Config::default()
    };
    fs::write(&config_path, config.to_toml().unwrap()).unwrap();

    let saved = fs::read_to_string(&config_path).unwrap();
    assert!(saved.contains("batch_size = 12"));
    assert!(saved.contains("extension = \".img\""));

    let loaded: Config = Config::figment(None, Some(&config_path))
        .unwrap()
        .extract()
        .unwrap();
    assert_eq!(loaded, config);
}
