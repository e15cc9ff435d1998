use crate::common::write_file;
use linkdupe::scanner::walker::has_extension;
use linkdupe::scanner::{ScanError, Walker, WalkerConfig};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn scan(root: &Path, config: WalkerConfig) -> Vec<PathBuf> {
    Walker::new(root, config)
        .walk()
        .filter_map(Result::ok)
        .map(|entry| entry.path)
        .collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    assert!(scan(dir.path(), WalkerConfig::new(0, None)).is_empty());
}

#[test]
fn test_scan_reports_sizes_and_recurses() {
    let dir = tempdir().unwrap();
    write_file(&dir, "top.bin", &[0u8; 10]);
    write_file(&dir, "sub/inner.bin", &[0u8; 20]);
    write_file(&dir, "sub/deep/leaf.bin", &[0u8; 30]);

    let mut entries: Vec<_> = Walker::new(dir.path(), WalkerConfig::new(1, None))
        .walk()
        .map(Result::unwrap)
        .map(|e| (e.path.file_name().unwrap().to_string_lossy().into_owned(), e.size))
        .collect();
    entries.sort();

    assert_eq!(
        entries,
        vec![
            ("inner.bin".to_string(), 20),
            ("leaf.bin".to_string(), 30),
            ("top.bin".to_string(), 10),
        ]
    );
}

#[test]
fn test_scan_skips_small_and_empty_files() {
    let dir = tempdir().unwrap();
    write_file(&dir, "empty", b"");
    write_file(&dir, "small", &[1u8; 99]);
    let kept = write_file(&dir, "big", &[1u8; 100]);

    assert_eq!(scan(dir.path(), WalkerConfig::new(100, None)), vec![kept]);
}

#[test]
fn test_scan_extension_filter_case_insensitive() {
    let dir = tempdir().unwrap();
    let upper = write_file(&dir, "a.TXT", b"x");
    let lower = write_file(&dir, "b.txt", b"x");
    write_file(&dir, "c.txt.bak", b"x");
    write_file(&dir, "txt", b"x");

    let found = scan(dir.path(), WalkerConfig::new(0, Some("txt".to_string())));
    assert_eq!(found, vec![upper, lower]);
}

#[cfg(unix)]
#[test]
fn test_scan_does_not_follow_symlinks() {
    let dir = tempdir().unwrap();
    let target = write_file(&dir, "real/file.bin", &[3u8; 50]);
    std::os::unix::fs::symlink(&target, dir.path().join("link.bin")).unwrap();
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("linked_dir")).unwrap();

    assert_eq!(scan(dir.path(), WalkerConfig::new(1, None)), vec![target]);
}

#[test]
fn test_scan_missing_root_yields_error() {
    let dir = tempdir().unwrap();
    let results: Vec<_> = Walker::new(&dir.path().join("missing"), WalkerConfig::default())
        .walk()
        .collect();

    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Err(ScanError::NotFound(_))));
}

#[test]
fn test_has_extension() {
    assert!(has_extension(Path::new("disk.ISO"), Some(".iso")));
    assert!(!has_extension(Path::new("disk.iso.part"), Some(".iso")));
    assert!(has_extension(Path::new("anything"), None));
}
