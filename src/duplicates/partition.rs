//! Content partitioning by streaming multi-way comparison.
//!
//! # Overview
//!
//! Given paths that all reported the same size, [`ContentPartitioner`]
//! splits them into [`EquivalenceGroup`]s of byte-identical files without
//! hashing and without buffering whole files.
//!
//! For each task the first path is the pivot. The remaining paths are opened
//! in batches of at most [`PartitionConfig::batch_size`] and read in lock-step
//! with the pivot, one chunk at a time:
//!
//! - a file whose chunk equals the pivot's stays active;
//! - a file that differs leaves the batch under a [`GroupKey`] made of the
//!   absolute offset of the first differing byte and its own byte there;
//! - a file that cannot supply a full chunk, or cannot be read, leaves the
//!   batch and is recorded as an [`Anomaly`].
//!
//! A pivot that cannot be opened, ends early or holds extra data abandons its
//! whole task: none of the task's files are grouped, and nothing is retried.
//!
//! Files still active when the pivot reaches the bucket size, and that are
//! themselves at end-of-file, join the pivot's group. Each key group of two or
//! more files becomes a new task resuming **at** the key offset, since its
//! members are already known to match on every earlier byte.
//!
//! # Work-list
//!
//! Tasks live on an explicit LIFO stack instead of the call stack. A task's
//! pivot group is emitted before its key groups are pushed, and key groups are
//! pushed in descending key order, so groups come out in the same depth-first
//! order a recursive formulation would produce.
//!
//! # Open handles
//!
//! All handles of a batch are dropped before the next batch opens; a file
//! eliminated mid-batch is closed immediately. Peak open handles never exceed
//! `batch_size + 1`.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::duplicates::{ContentPartitioner, PartitionConfig, SizeBucket};
//! use linkdupe::scanner::OsFileSystem;
//! use std::path::PathBuf;
//!
//! let bucket = SizeBucket::new(
//!     65_536,
//!     vec![PathBuf::from("a.iso"), PathBuf::from("b.iso"), PathBuf::from("c.iso")],
//! );
//!
//! let fs = OsFileSystem;
//! let mut partitioner = ContentPartitioner::new(&fs, PartitionConfig::default());
//! let outcome = partitioner.partition(&bucket);
//!
//! for group in &outcome.groups {
//!     println!("{} identical files of {} bytes", group.len(), group.size);
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{EquivalenceGroup, SizeBucket};
use crate::scanner::FileSystem;

/// Default number of candidate files compared against one pivot at a time.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Default number of bytes read from each file per comparison step.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Upper bound for the chunk size.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for content partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionConfig {
    /// Maximum candidate files open at once, not counting the pivot.
    pub batch_size: usize,
    /// Bytes read per file per comparison step.
    pub chunk_size: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PartitionConfig {
    /// Create a configuration, clamping both values to their valid range.
    #[must_use]
    pub fn new(batch_size: usize, chunk_size: usize) -> Self {
        Self::default()
            .with_batch_size(batch_size)
            .with_chunk_size(chunk_size)
    }

    /// Set the batch size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the chunk size (between 1 byte and 64 MiB).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }
}

/// Where and how a candidate first diverged from the pivot.
///
/// Candidates sharing a key match the pivot on `[0, offset)` and each other
/// at `offset`. Keys order by offset, then byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    /// Absolute offset of the first differing byte
    pub offset: u64,
    /// The candidate's byte at that offset
    pub byte: u8,
}

/// A file that left comparison for a reason other than a content mismatch.
///
/// None of these escalate; the affected file simply joins no group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A candidate could not be opened.
    OpenFailed {
        /// Affected file
        path: PathBuf,
        /// Error description
        error: String,
    },
    /// A candidate failed while being read.
    ReadFailed {
        /// Affected file
        path: PathBuf,
        /// Offset of the failed read
        offset: u64,
        /// Error description
        error: String,
    },
    /// A candidate ended before the size reported at scan time.
    ShortRead {
        /// Affected file
        path: PathBuf,
        /// Bytes actually available
        actual: u64,
        /// Size reported at scan time
        expected: u64,
    },
    /// A candidate holds data past the size reported at scan time.
    TrailingData {
        /// Affected file
        path: PathBuf,
        /// Size reported at scan time
        expected: u64,
    },
    /// The pivot could not be opened or read in full. No file of the task
    /// that pivot led is grouped.
    PivotUnavailable {
        /// The pivot file
        path: PathBuf,
        /// Offset at which comparison stopped
        offset: u64,
        /// What went wrong
        reason: String,
    },
}

impl Anomaly {
    /// Short machine-readable name of the anomaly.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpenFailed { .. } => "open_failed",
            Self::ReadFailed { .. } => "read_failed",
            Self::ShortRead { .. } => "short_read",
            Self::TrailingData { .. } => "trailing_data",
            Self::PivotUnavailable { .. } => "pivot_unavailable",
        }
    }

    /// The file this anomaly concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::OpenFailed { path, .. }
            | Self::ReadFailed { path, .. }
            | Self::ShortRead { path, .. }
            | Self::TrailingData { path, .. }
            | Self::PivotUnavailable { path, .. } => path,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed { path, error } => {
                write!(f, "cannot open {}: {}", path.display(), error)
            }
            Self::ReadFailed {
                path,
                offset,
                error,
            } => write!(
                f,
                "read failed at offset {} in {}: {}",
                offset,
                path.display(),
                error
            ),
            Self::ShortRead {
                path,
                actual,
                expected,
            } => write!(
                f,
                "{} ended after {} bytes, expected {}",
                path.display(),
                actual,
                expected
            ),
            Self::TrailingData { path, expected } => write!(
                f,
                "{} holds data past its expected size of {} bytes",
                path.display(),
                expected
            ),
            Self::PivotUnavailable {
                path,
                offset,
                reason,
            } => write!(
                f,
                "pivot {} unusable at offset {}: {}",
                path.display(),
                offset,
                reason
            ),
        }
    }
}

/// Counters collected while partitioning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    /// Tasks taken off the work-list with two or more members
    pub tasks: usize,
    /// Batches opened
    pub batches: usize,
    /// Candidate bytes compared against a pivot
    pub bytes_compared: u64,
    /// Highest number of simultaneously open handles
    pub peak_open_handles: usize,
}

impl PartitionStats {
    /// Fold another set of counters into this one.
    pub fn merge(&mut self, other: &Self) {
        self.tasks += other.tasks;
        self.batches += other.batches;
        self.bytes_compared += other.bytes_compared;
        self.peak_open_handles = self.peak_open_handles.max(other.peak_open_handles);
    }
}

/// Result of partitioning one bucket.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartitionOutcome {
    /// Groups of two or more identical files, in depth-first order
    pub groups: Vec<EquivalenceGroup>,
    /// Files dropped for reasons other than a content mismatch
    pub anomalies: Vec<Anomaly>,
    /// Counters
    pub stats: PartitionStats,
}

/// Candidate paths plus the offset up to which they are known to agree.
#[derive(Debug)]
struct PartitionTask {
    paths: Vec<PathBuf>,
    offset: u64,
}

/// Per-task results accumulated across batches.
#[derive(Debug)]
struct TaskResults {
    pivot_group: Vec<PathBuf>,
    key_groups: BTreeMap<GroupKey, Vec<PathBuf>>,
}

/// An open candidate in a batch.
struct Cursor<'p, R> {
    path: &'p Path,
    reader: R,
}

/// Open handles of one batch plus the offset confirmed equal so far.
///
/// Dropping the session closes every handle it still holds.
struct ComparisonSession<'p, R> {
    pivot: R,
    rights: Vec<Cursor<'p, R>>,
    offset: u64,
}

/// Splits same-size files into groups of byte-identical files.
pub struct ContentPartitioner<'a, F: FileSystem> {
    fs: &'a F,
    config: PartitionConfig,
    pivot_buf: Vec<u8>,
    right_buf: Vec<u8>,
}

impl<'a, F: FileSystem> ContentPartitioner<'a, F> {
    /// Create a partitioner reading through `fs`.
    #[must_use]
    pub fn new(fs: &'a F, config: PartitionConfig) -> Self {
        let config = PartitionConfig::new(config.batch_size, config.chunk_size);
        Self {
            fs,
            config,
            pivot_buf: vec![0; config.chunk_size],
            right_buf: vec![0; config.chunk_size],
        }
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> PartitionConfig {
        self.config
    }

    /// Partition a whole bucket, starting from the first byte.
    pub fn partition(&mut self, bucket: &SizeBucket) -> PartitionOutcome {
        self.partition_from(bucket.size, &bucket.paths, 0)
    }

    /// Partition `paths`, all of length `size`, resuming at `offset`.
    ///
    /// Bytes before `offset` are trusted to be equal across all paths and are
    /// never read.
    pub fn partition_from(&mut self, size: u64, paths: &[PathBuf], offset: u64) -> PartitionOutcome {
        let mut outcome = PartitionOutcome::default();
        let mut work = vec![PartitionTask {
            paths: paths.to_vec(),
            offset,
        }];

        while let Some(task) = work.pop() {
            self.run_task(task, size, &mut work, &mut outcome);
        }

        log::debug!(
            "Partitioned {} files of {} bytes: {} groups, {} anomalies, {} tasks",
            paths.len(),
            size,
            outcome.groups.len(),
            outcome.anomalies.len(),
            outcome.stats.tasks
        );

        outcome
    }

    fn run_task(
        &mut self,
        task: PartitionTask,
        size: u64,
        work: &mut Vec<PartitionTask>,
        outcome: &mut PartitionOutcome,
    ) {
        let Some((pivot, rights)) = task.paths.split_first() else {
            return;
        };
        if rights.is_empty() {
            return;
        }

        outcome.stats.tasks += 1;
        log::trace!(
            "Task: {} files at offset {}, pivot {}",
            task.paths.len(),
            task.offset,
            pivot.display()
        );

        let mut results = TaskResults {
            pivot_group: vec![pivot.clone()],
            key_groups: BTreeMap::new(),
        };

        for batch in rights.chunks(self.config.batch_size) {
            outcome.stats.batches += 1;
            if let Err(anomaly) = self.compare_batch(pivot, batch, task.offset, size, &mut results, outcome) {
                record(&mut outcome.anomalies, anomaly);
                // Nothing compared against this pivot is grouped, including
                // key groups from earlier batches.
                log::debug!(
                    "Abandoned {} files at offset {}: pivot unusable",
                    task.paths.len(),
                    task.offset
                );
                return;
            }
        }

        if results.pivot_group.len() >= 2 {
            log::debug!(
                "Equivalence group of {} files ({} bytes), master {}",
                results.pivot_group.len(),
                size,
                pivot.display()
            );
            outcome
                .groups
                .push(EquivalenceGroup::new(size, results.pivot_group));
        }

        for (key, paths) in results.key_groups.into_iter().rev() {
            if paths.len() >= 2 {
                work.push(PartitionTask {
                    paths,
                    offset: key.offset,
                });
            }
        }
    }

    /// Compare one batch against the pivot.
    ///
    /// Returns `Err` only when the pivot itself is unusable.
    fn compare_batch(
        &mut self,
        pivot: &Path,
        batch: &[PathBuf],
        offset: u64,
        size: u64,
        results: &mut TaskResults,
        outcome: &mut PartitionOutcome,
    ) -> Result<(), Anomaly> {
        let pivot_unavailable = |offset: u64, reason: String| Anomaly::PivotUnavailable {
            path: pivot.to_path_buf(),
            offset,
            reason,
        };

        let pivot_reader = self
            .fs
            .open_at(pivot, offset)
            .map_err(|e| pivot_unavailable(offset, e.to_string()))?;

        let mut session = ComparisonSession {
            pivot: pivot_reader,
            rights: Vec::with_capacity(batch.len()),
            offset,
        };

        for path in batch {
            match self.fs.open_at(path, offset) {
                Ok(reader) => session.rights.push(Cursor {
                    path: path.as_path(),
                    reader,
                }),
                Err(e) => record(
                    &mut outcome.anomalies,
                    Anomaly::OpenFailed {
                        path: path.clone(),
                        error: e.to_string(),
                    },
                ),
            }
        }

        let stats = &mut outcome.stats;
        stats.peak_open_handles = stats.peak_open_handles.max(session.rights.len() + 1);

        let anomalies = &mut outcome.anomalies;
        let chunk_size = self.config.chunk_size as u64;

        while !session.rights.is_empty() && session.offset < size {
            let want = chunk_size.min(size - session.offset) as usize;
            let chunk = &mut self.pivot_buf[..want];
            let n = read_chunk(&mut session.pivot, chunk)
                .map_err(|e| pivot_unavailable(session.offset, e.to_string()))?;
            if n < want {
                return Err(pivot_unavailable(
                    session.offset + n as u64,
                    format!("ended before its expected size of {size} bytes"),
                ));
            }

            let chunk = &self.pivot_buf[..want];
            let right_buf = &mut self.right_buf[..want];
            let base = session.offset;

            session.rights.retain_mut(|cursor| {
                let got = match read_chunk(&mut cursor.reader, &mut right_buf[..]) {
                    Ok(got) => got,
                    Err(e) => {
                        record(
                            anomalies,
                            Anomaly::ReadFailed {
                                path: cursor.path.to_path_buf(),
                                offset: base,
                                error: e.to_string(),
                            },
                        );
                        return false;
                    }
                };

                if got < want {
                    record(
                        anomalies,
                        Anomaly::ShortRead {
                            path: cursor.path.to_path_buf(),
                            actual: base + got as u64,
                            expected: size,
                        },
                    );
                    return false;
                }

                stats.bytes_compared += want as u64;
                if chunk == &right_buf[..] {
                    return true;
                }

                match chunk.iter().zip(right_buf.iter()).position(|(a, b)| a != b) {
                    Some(index) => {
                        let key = GroupKey {
                            offset: base + index as u64,
                            byte: right_buf[index],
                        };
                        log::trace!(
                            "{} diverges at offset {} (byte {:#04x})",
                            cursor.path.display(),
                            key.offset,
                            key.byte
                        );
                        results
                            .key_groups
                            .entry(key)
                            .or_default()
                            .push(cursor.path.to_path_buf());
                        false
                    }
                    None => true,
                }
            });

            session.offset += want as u64;
        }

        if session.rights.is_empty() {
            return Ok(());
        }

        match at_eof(&mut session.pivot) {
            Ok(true) => {}
            Ok(false) => {
                return Err(pivot_unavailable(
                    session.offset,
                    format!("holds data past its expected size of {size} bytes"),
                ))
            }
            Err(e) => return Err(pivot_unavailable(session.offset, e.to_string())),
        }

        for mut cursor in session.rights.drain(..) {
            match at_eof(&mut cursor.reader) {
                Ok(true) => results.pivot_group.push(cursor.path.to_path_buf()),
                Ok(false) => record(
                    anomalies,
                    Anomaly::TrailingData {
                        path: cursor.path.to_path_buf(),
                        expected: size,
                    },
                ),
                Err(e) => record(
                    anomalies,
                    Anomaly::ReadFailed {
                        path: cursor.path.to_path_buf(),
                        offset: session.offset,
                        error: e.to_string(),
                    },
                ),
            }
        }

        Ok(())
    }
}

impl<F: FileSystem> fmt::Debug for ContentPartitioner<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentPartitioner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn record(anomalies: &mut Vec<Anomaly>, anomaly: Anomaly) {
    log::warn!("Anomaly: {anomaly}");
    anomalies.push(anomaly);
}

/// Fill `buf` completely, or as far as end-of-file allows.
///
/// Returns the number of bytes read; `Interrupted` reads are retried.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn at_eof<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut probe = [0u8; 1];
    Ok(read_chunk(reader, &mut probe)? == 0)
}
