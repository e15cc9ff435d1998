use crate::common::{pattern, same_file, write_file, RecordingFs};
use linkdupe::actions::{DedupError, FileOutcome, HardLinkDeduplicator, LinkConfig};
use linkdupe::duplicates::{ContentPartitioner, PartitionConfig, SizeBucket};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_one_file_differs_mid_file() {
    let dir = tempdir().unwrap();
    let content = pattern(100, 1);
    let mut other = content.clone();
    other[50] ^= 0xff;

    let a = write_file(&dir, "a.bin", &content);
    let b = write_file(&dir, "b.bin", &content);
    let c = write_file(&dir, "c.bin", &other);
    let c_before = fs::read(&c).unwrap();

    let fs = RecordingFs::default();
    let bucket = SizeBucket::new(100, vec![a.clone(), b.clone(), c.clone()]);
    let outcome = ContentPartitioner::new(&fs, PartitionConfig::default()).partition(&bucket);

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].paths, vec![a.clone(), b.clone()]);
    assert!(outcome.anomalies.is_empty());

    let result = HardLinkDeduplicator::new(&fs, LinkConfig::default())
        .deduplicate(&outcome.groups[0])
        .unwrap();

    assert_eq!(result.linked_count(), 1);
    assert!(same_file(&a, &b));
    assert!(!same_file(&a, &c));
    assert_eq!(fs::read(&c).unwrap(), c_before);
}

#[test]
fn test_last_byte_differs() {
    let dir = tempdir().unwrap();
    let content = pattern(4096 + 17, 9);
    let mut other = content.clone();
    let last = other.len() - 1;
    other[last] = other[last].wrapping_add(1);

    let a = write_file(&dir, "a.bin", &content);
    let b = write_file(&dir, "b.bin", &other);

    let fs = RecordingFs::default();
    let bucket = SizeBucket::new(content.len() as u64, vec![a, b]);
    let outcome = ContentPartitioner::new(&fs, PartitionConfig::default()).partition(&bucket);

    assert!(outcome.groups.is_empty());
    assert_eq!(fs.mutations(), 0);
    assert_eq!(fs.open_now(), 0);
}

#[test]
fn test_existing_link_is_skipped() {
    let dir = tempdir().unwrap();
    let content = pattern(100, 3);
    let a = write_file(&dir, "a.bin", &content);
    let b = dir.path().join("b.bin");
    if let Err(e) = fs::hard_link(&a, &b) {
        eprintln!("Skipping test: failed to create hard link: {}", e);
        return;
    }
    let c = write_file(&dir, "c.bin", &content);

    let fs = RecordingFs::default();
    let bucket = SizeBucket::new(100, vec![a.clone(), b.clone(), c.clone()]);
    let outcome = ContentPartitioner::new(&fs, PartitionConfig::default()).partition(&bucket);
    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 3);

    let result = HardLinkDeduplicator::new(&fs, LinkConfig::default())
        .deduplicate(&outcome.groups[0])
        .unwrap();

    assert_eq!(
        result.files[0],
        FileOutcome::AlreadyLinked { path: b.clone() }
    );
    assert!(matches!(result.files[1], FileOutcome::Linked { .. }));
    // One temporary link plus one rename, both for c.
    assert_eq!(fs.links.get(), 1);
    assert_eq!(fs.renames.get(), 1);
    assert_eq!(fs.removes.get(), 0);
    assert!(same_file(&a, &c));
}

#[test]
fn test_master_lookup_failure() {
    let dir = tempdir().unwrap();
    let content = pattern(64, 5);
    let a = write_file(&dir, "a.bin", &content);
    let b = write_file(&dir, "b.bin", &content);

    let fs = RecordingFs::failing_status(&a);
    let bucket = SizeBucket::new(64, vec![a.clone(), b.clone()]);
    let outcome = ContentPartitioner::new(&fs, PartitionConfig::default()).partition(&bucket);
    assert_eq!(outcome.groups.len(), 1);

    let err = HardLinkDeduplicator::new(&fs, LinkConfig::default())
        .deduplicate(&outcome.groups[0])
        .unwrap_err();

    assert!(matches!(err, DedupError::MasterIdentity { ref path, .. } if *path == a));
    assert_eq!(fs.mutations(), 0);
    assert!(!same_file(&a, &b));
}
