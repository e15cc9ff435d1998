use crate::common::{pattern, same_file, write_file, RecordingFs};
use linkdupe::actions::LinkConfig;
use linkdupe::driver::{Driver, DriverConfig, DriverError};
use linkdupe::duplicates::PartitionConfig;
use linkdupe::error::ExitCode;
use linkdupe::scanner::WalkerConfig;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn config(min_size: u64, extension: Option<&str>) -> DriverConfig {
    DriverConfig {
        walker: WalkerConfig::new(min_size, extension.map(str::to_string)),
        ..DriverConfig::default()
    }
}

#[test]
fn test_nested_directories_linked() {
    let dir = tempdir().unwrap();
    let content = pattern(2000, 1);
    let a = write_file(&dir, "one/a.dat", &content);
    let b = write_file(&dir, "two/deeper/b.dat", &content);
    let c = write_file(&dir, "c.dat", &pattern(2000, 2));

    let report = Driver::new(config(1, None)).run(dir.path()).unwrap();

    assert_eq!(report.scan.files, 3);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.linked_count(), 1);
    assert_eq!(report.bytes_reclaimed(), 2000);
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert!(same_file(&a, &b));
    assert!(!same_file(&a, &c));
}

#[test]
fn test_no_duplicates_is_success() {
    let dir = tempdir().unwrap();
    write_file(&dir, "a", &pattern(500, 1));
    write_file(&dir, "b", &pattern(500, 2));
    write_file(&dir, "c", &pattern(501, 1));

    let report = Driver::new(config(1, None)).run(dir.path()).unwrap();

    assert!(report.groups.is_empty());
    assert!(report.outcomes.is_empty());
    assert_eq!(report.exit_code(), ExitCode::Success);
}

#[test]
fn test_extension_filter() {
    let dir = tempdir().unwrap();
    let content = pattern(300, 7);
    let iso_a = write_file(&dir, "a.ISO", &content);
    let iso_b = write_file(&dir, "b.iso", &content);
    let txt = write_file(&dir, "c.txt", &content);

    let report = Driver::new(config(1, Some(".iso"))).run(dir.path()).unwrap();

    assert_eq!(report.scan.files, 2);
    assert_eq!(report.groups.len(), 1);
    assert!(same_file(&iso_a, &iso_b));
    assert!(!same_file(&iso_a, &txt));
}

#[test]
fn test_min_size_threshold() {
    let dir = tempdir().unwrap();
    let small = pattern(1000, 3);
    let large = pattern(20 * 1024, 3);
    let s1 = write_file(&dir, "s1", &small);
    let s2 = write_file(&dir, "s2", &small);
    write_file(&dir, "l1", &large);
    write_file(&dir, "l2", &large);

    let report = Driver::new(DriverConfig::default()).run(dir.path()).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].size, 20 * 1024);
    assert!(!same_file(&s1, &s2));
}

#[test]
fn test_handle_bound_with_many_candidates() {
    let dir = tempdir().unwrap();
    let content = pattern(100, 4);
    for i in 0..20 {
        write_file(&dir, &format!("f{i:02}"), &content);
    }

    let driver = Driver::with_fs(
        RecordingFs::default(),
        DriverConfig {
            partition: PartitionConfig::default().with_batch_size(4),
            ..config(1, None)
        },
    );
    let report = driver.run(dir.path()).unwrap();

    assert!(driver.fs().peak_open() <= 5);
    assert_eq!(report.partition.peak_open_handles, driver.fs().peak_open());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].len(), 20);
    assert_eq!(report.linked_count(), 19);
    assert_eq!(driver.fs().open_now(), 0);
}

#[test]
fn test_fatal_error_stops_later_groups() {
    let dir = tempdir().unwrap();
    let small = pattern(200, 1);
    let large = pattern(400, 1);
    let s1 = write_file(&dir, "s1", &small);
    let s2 = write_file(&dir, "s2", &small);
    let l1 = write_file(&dir, "l1", &large);
    let l2 = write_file(&dir, "l2", &large);

    // Smaller sizes are processed first, so the small group is linked
    // before the large group's master fails.
    let driver = Driver::with_fs(RecordingFs::failing_status(&l1), config(1, None));
    let report = driver.run(dir.path()).unwrap();

    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.fatal.is_some());
    assert_eq!(report.exit_code(), ExitCode::DedupAborted);
    assert!(same_file(&s1, &s2));
    assert!(!same_file(&l1, &l2));
}

#[test]
fn test_fatal_error_on_first_group() {
    let dir = tempdir().unwrap();
    let small = pattern(200, 1);
    let large = pattern(400, 1);
    let s1 = write_file(&dir, "s1", &small);
    write_file(&dir, "s2", &small);
    let l1 = write_file(&dir, "l1", &large);
    let l2 = write_file(&dir, "l2", &large);

    let driver = Driver::with_fs(RecordingFs::failing_status(&s1), config(1, None));
    let report = driver.run(dir.path()).unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(report.exit_code(), ExitCode::DedupAborted);
    assert_eq!(driver.fs().mutations(), 0);
    assert!(!same_file(&l1, &l2));
}

#[test]
fn test_unreadable_pivot_leaves_its_bucket_untouched() {
    let dir = tempdir().unwrap();
    let content = pattern(64, 4);
    let a = write_file(&dir, "a", &content);
    let b = write_file(&dir, "b", &content);
    let c = write_file(&dir, "c", &content);
    let x = write_file(&dir, "x", &pattern(128, 6));
    let y = write_file(&dir, "y", &pattern(128, 6));

    let fs = RecordingFs::default();
    fs.fail_open.borrow_mut().insert(a.clone());
    let driver = Driver::with_fs(fs, config(1, None));
    let report = driver.run(dir.path()).unwrap();

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].paths, vec![x.clone(), y.clone()]);
    assert_eq!(report.anomalies.len(), 1);
    assert_eq!(report.anomalies[0].kind(), "pivot_unavailable");
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert!(same_file(&x, &y));
    assert!(!same_file(&a, &b));
    assert!(!same_file(&b, &c));
}

#[test]
fn test_interrupted_run() {
    let dir = tempdir().unwrap();
    let content = pattern(100, 1);
    let a = write_file(&dir, "a", &content);
    let b = write_file(&dir, "b", &content);

    let flag = Arc::new(AtomicBool::new(true));
    let report = Driver::new(config(1, None))
        .with_shutdown_flag(flag)
        .run(dir.path())
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.exit_code(), ExitCode::Interrupted);
    assert!(!same_file(&a, &b));
}

#[test]
fn test_dry_run_end_to_end() {
    let dir = tempdir().unwrap();
    let content = pattern(100, 1);
    let a = write_file(&dir, "a", &content);
    let b = write_file(&dir, "b", &content);

    let report = Driver::new(DriverConfig {
        link: LinkConfig::default().with_dry_run(true),
        ..config(1, None)
    })
    .run(dir.path())
    .unwrap();

    assert_eq!(report.linked_count(), 1);
    assert_eq!(report.bytes_reclaimed(), 100);
    assert!(!same_file(&a, &b));
}

#[test]
fn test_invalid_roots() {
    let dir = tempdir().unwrap();
    let file = write_file(&dir, "plain", b"data");

    assert!(matches!(
        Driver::new(config(1, None)).run(&dir.path().join("missing")),
        Err(DriverError::PathNotFound(_))
    ));
    assert!(matches!(
        Driver::new(config(1, None)).run(&file),
        Err(DriverError::NotADirectory(_))
    ));
    assert!(fs::metadata(&file).is_ok());
}
