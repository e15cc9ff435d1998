//! Size-based bucketing of scanned files.
//!
//! # Overview
//!
//! Files with different sizes cannot be byte-identical, so the first step is
//! to bucket candidates by exact size. Only buckets holding two or more files
//! are handed to the content partitioner.
//!
//! Buckets come back in ascending size order, and within a bucket files keep
//! the order in which the scanner discovered them. The first file of a bucket
//! is therefore the first pivot the partitioner uses.
//!
//! # Example
//!
//! ```
//! use linkdupe::scanner::FileEntry;
//! use linkdupe::duplicates::group_by_size;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileEntry::new(PathBuf::from("/a.bin"), 20_000),
//!     FileEntry::new(PathBuf::from("/b.bin"), 20_000),
//!     FileEntry::new(PathBuf::from("/c.bin"), 30_000),
//!     FileEntry::new(PathBuf::from("/tiny.bin"), 10),
//! ];
//!
//! let (buckets, stats) = group_by_size(files, 16 * 1024);
//!
//! assert_eq!(buckets.len(), 1);
//! assert_eq!(buckets[0].size, 20_000);
//! assert_eq!(stats.below_min_size, 1);
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::scanner::FileEntry;

/// Paths that all reported the same byte length at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBucket {
    /// Shared file size in bytes
    pub size: u64,
    /// Member paths in scan order
    pub paths: Vec<PathBuf>,
}

impl SizeBucket {
    /// Create a bucket from a size and its member paths.
    #[must_use]
    pub fn new(size: u64, paths: Vec<PathBuf>) -> Self {
        Self { size, paths }
    }

    /// Number of files in this bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if this bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Statistics from the bucketing phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    /// Number of files offered for bucketing
    pub total_files: usize,
    /// Total size of all offered files in bytes
    pub total_size: u64,
    /// Files dropped because they are smaller than the minimum size
    pub below_min_size: usize,
    /// Number of distinct sizes among the retained files
    pub unique_sizes: usize,
    /// Files whose size no other file shares
    pub eliminated_unique: usize,
    /// Files placed in a bucket of two or more
    pub candidates: usize,
    /// Buckets of two or more files
    pub buckets: usize,
}

impl BucketStats {
    /// Percentage of offered files eliminated before any content is read.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            let eliminated = self.total_files - self.candidates;
            (eliminated as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Bucket files by exact size.
///
/// Files below `min_size` are discarded, as are empty files regardless of
/// the threshold. Sizes seen only once are eliminated. The remaining buckets
/// are returned in ascending size order with scan order preserved inside
/// each bucket.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileEntry>,
    min_size: u64,
) -> (Vec<SizeBucket>, BucketStats) {
    let mut by_size: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    let mut stats = BucketStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_size += file.size;

        if file.size == 0 || file.size < min_size {
            stats.below_min_size += 1;
            log::trace!(
                "Below minimum size ({} bytes): {}",
                file.size,
                file.path.display()
            );
            continue;
        }

        by_size.entry(file.size).or_default().push(file.path);
    }

    stats.unique_sizes = by_size.len();

    let mut buckets = Vec::new();
    for (size, paths) in by_size {
        if paths.len() < 2 {
            stats.eliminated_unique += 1;
            log::trace!("Eliminated unique size {}: {}", size, paths[0].display());
            continue;
        }

        log::debug!("Size bucket {} bytes: {} candidates", size, paths.len());
        stats.candidates += paths.len();
        stats.buckets += 1;
        buckets.push(SizeBucket::new(size, paths));
    }

    log::info!(
        "Bucketing complete: {} files -> {} candidates in {} buckets ({:.1}% eliminated)",
        stats.total_files,
        stats.candidates,
        stats.buckets,
        stats.elimination_rate()
    );

    (buckets, stats)
}
