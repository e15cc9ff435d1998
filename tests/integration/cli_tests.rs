use crate::common::{pattern, same_file, write_file};
use clap::Parser;
use linkdupe::actions::LinkStrategy;
use linkdupe::cli::{Cli, OutputFormat};
use linkdupe::error::ExitCode;
use std::ffi::OsString;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_cli_minimal() {
    let cli = Cli::try_parse_from(["linkdupe", "/data"]).unwrap();
    assert_eq!(cli.root, PathBuf::from("/data"));
    assert!(cli.extension.is_none());
    assert_eq!(cli.output, OutputFormat::Text);
    assert!(!cli.dry_run);
}

#[test]
fn test_cli_all_options() {
    let cli = Cli::try_parse_from([
        "linkdupe",
        "/data",
        ".iso",
        "--min-size",
        "1MiB",
        "--batch-size",
        "32",
        "--chunk-size",
        "64KiB",
        "--strategy",
        "delete-then-link",
        "-n",
        "--output",
        "json",
        "-vv",
    ])
    .unwrap();

    assert_eq!(cli.extension.as_deref(), Some(".iso"));
    assert_eq!(cli.min_size, Some(1024 * 1024));
    assert_eq!(cli.batch_size, Some(32));
    assert_eq!(cli.chunk_size, Some(64 * 1024));
    assert_eq!(cli.strategy, Some(LinkStrategy::DeleteThenLink));
    assert!(cli.dry_run);
    assert_eq!(cli.output, OutputFormat::Json);
    assert_eq!(cli.verbose, 2);
}

#[test]
fn test_cli_rejects_bad_input() {
    assert!(Cli::try_parse_from(["linkdupe"]).is_err());
    assert!(Cli::try_parse_from(["linkdupe", "/data", "--min-size", "lots"]).is_err());
    assert!(Cli::try_parse_from(["linkdupe", "/data", "--strategy", "copy"]).is_err());
    assert!(Cli::try_parse_from(["linkdupe", "/data", "-q", "-v"]).is_err());
}

#[test]
fn test_run_app_print_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "batch_size = 8\n").unwrap();

    let cli = Cli::try_parse_from::<_, OsString>([
        "linkdupe".into(),
        temp_dir.path().into(),
        "--config".into(),
        config_path.as_os_str().into(),
        "--print-config".into(),
        "-q".into(),
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
}

#[test]
fn test_run_app_dry_run_json() {
    let temp_dir = tempdir().unwrap();
    let data = pattern(20_000, 3);
    let a = write_file(&temp_dir, "a.bin", &data);
    let b = write_file(&temp_dir, "b.bin", &data);

    let cli = Cli::try_parse_from::<_, OsString>([
        "linkdupe".into(),
        temp_dir.path().into(),
        "--dry-run".into(),
        "--output".into(),
        "json".into(),
        "-q".into(),
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(!same_file(&a, &b));
}

#[test]
fn test_run_app_links_duplicates() {
    let temp_dir = tempdir().unwrap();
    let data = pattern(20_000, 9);
    let a = write_file(&temp_dir, "a.bin", &data);
    let b = write_file(&temp_dir, "b.bin", &data);

    let cli = Cli::try_parse_from::<_, OsString>([
        "linkdupe".into(),
        temp_dir.path().into(),
        "--no-color".into(),
        "-q".into(),
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(same_file(&a, &b));
}

#[test]
fn test_run_app_missing_root() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("absent");

    let cli = Cli::try_parse_from::<_, OsString>([
        "linkdupe".into(),
        missing.as_os_str().into(),
        "-q".into(),
    ])
    .unwrap();

    let err = linkdupe::run_app(cli).unwrap_err();
    assert!(format!("{err:#}").contains("Cannot deduplicate"));
}

#[test]
fn test_run_app_missing_config_file() {
    let temp_dir = tempdir().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let cli = Cli::try_parse_from::<_, OsString>([
        "linkdupe".into(),
        temp_dir.path().into(),
        "--config".into(),
        missing.as_os_str().into(),
        "-q".into(),
    ])
    .unwrap();

    let err = linkdupe::run_app(cli).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to load configuration"));
}
