//! Run orchestration: scan, bucket, partition, link.
//!
//! # Overview
//!
//! [`Driver`] runs the whole pipeline in a single thread:
//!
//! 1. **Scan** - Walk the root directory and collect candidate files
//! 2. **Bucket** - Group files by exact size, smallest sizes first
//! 3. **Partition** - Split each bucket into groups of identical files
//! 4. **Link** - Replace each group's duplicates with hard links to its master
//!
//! All groups are found before the first link is made. If a group's master
//! cannot be identified, linking stops at that group and the error is kept in
//! [`RunReport::fatal`]; groups linked before it stay linked.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::driver::{Driver, DriverConfig};
//! use std::path::Path;
//!
//! let driver = Driver::new(DriverConfig::default());
//! let report = driver.run(Path::new("/srv/media")).unwrap();
//!
//! println!("{} groups, {} files linked", report.groups.len(), report.linked_count());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::actions::{DedupError, GroupOutcome, HardLinkDeduplicator, LinkConfig};
use crate::duplicates::{
    group_by_size, Anomaly, BucketStats, ContentPartitioner, EquivalenceGroup, PartitionConfig,
    PartitionStats,
};
use crate::error::ExitCode;
use crate::progress::{ProgressCallback, PHASE_LINK, PHASE_PARTITION, PHASE_SCAN};
use crate::scanner::{identity, FileEntry, FileSystem, OsFileSystem, Walker, WalkerConfig};

/// Settings for every phase of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// Directory walking and size filtering
    pub walker: WalkerConfig,
    /// Content comparison
    pub partition: PartitionConfig,
    /// Link replacement
    pub link: LinkConfig,
}

/// Errors that prevent a run from starting.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Persistent file identity is unavailable on this platform.
    #[error("Hard-link deduplication is not supported on this platform")]
    UnsupportedPlatform,
}

/// Counters from the scan phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Candidate files found
    pub files: usize,
    /// Entries skipped because of an error
    pub errors: usize,
    /// Total size of the candidate files in bytes
    pub bytes: u64,
}

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseDurations {
    /// Directory walk
    pub scan: Duration,
    /// Bucketing and content comparison
    pub partition: Duration,
    /// Link replacement
    pub link: Duration,
}

/// Everything a run found and did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Scan counters
    pub scan: ScanSummary,
    /// Bucketing counters
    pub buckets: BucketStats,
    /// Comparison counters, summed over all buckets
    pub partition: PartitionStats,
    /// Files dropped during comparison for reasons other than a mismatch
    pub anomalies: Vec<Anomaly>,
    /// Groups of identical files, in discovery order
    pub groups: Vec<EquivalenceGroup>,
    /// One outcome per group that went through the link phase
    pub outcomes: Vec<GroupOutcome>,
    /// The error that stopped the link phase, if any
    pub fatal: Option<DedupError>,
    /// Whether the run stopped early on request
    pub interrupted: bool,
    /// Time per phase
    pub durations: PhaseDurations,
}

impl RunReport {
    /// Exit code reflecting how the run ended.
    ///
    /// Per-file skips do not affect it; only a fatal link error or an
    /// interruption does.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.fatal.is_some() {
            ExitCode::DedupAborted
        } else if self.interrupted {
            ExitCode::Interrupted
        } else {
            ExitCode::Success
        }
    }

    /// Duplicates replaced by links (or that would be, in a dry run).
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.outcomes.iter().map(GroupOutcome::linked_count).sum()
    }

    /// Duplicates that already shared their master's data.
    #[must_use]
    pub fn already_linked_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(GroupOutcome::already_linked_count)
            .sum()
    }

    /// Duplicates left as they were because of an error or failed check.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().map(GroupOutcome::skipped_count).sum()
    }

    /// Bytes freed by the links made.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.outcomes.iter().map(GroupOutcome::bytes_reclaimed).sum()
    }

    /// Bytes held by every non-master copy in the groups found.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.groups.iter().map(EquivalenceGroup::wasted_space).sum()
    }
}

/// Orchestrates a complete deduplication run.
pub struct Driver<F: FileSystem = OsFileSystem> {
    fs: F,
    config: DriverConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl Driver<OsFileSystem> {
    /// Create a driver working on the real filesystem.
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self::with_fs(OsFileSystem, config)
    }
}

impl<F: FileSystem> Driver<F> {
    /// Create a driver over a custom filesystem.
    #[must_use]
    pub fn with_fs(fs: F, config: DriverConfig) -> Self {
        Self {
            fs,
            config,
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Stop between buckets and between groups once this flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report phase progress to `callback`.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The filesystem this driver works on.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// The run configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Scan `root` and deduplicate everything found below it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if the root is missing or not a directory, or
    /// if the platform cannot report file identities. Everything that goes
    /// wrong after the run has started is recorded in the [`RunReport`].
    pub fn run(&self, root: &Path) -> Result<RunReport, DriverError> {
        if !identity::is_supported() {
            return Err(DriverError::UnsupportedPlatform);
        }
        if !root.exists() {
            return Err(DriverError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(DriverError::NotADirectory(root.to_path_buf()));
        }

        log::info!("Starting deduplication of {}", root.display());

        let mut report = RunReport::default();
        let started = Instant::now();
        let entries = self.scan(root, &mut report.scan);
        report.durations.scan = started.elapsed();

        log::info!(
            "Found {} candidate files ({}), {} entries skipped",
            report.scan.files,
            bytesize::ByteSize::b(report.scan.bytes),
            report.scan.errors
        );

        if self.is_shutdown_requested() {
            log::info!("Interrupted after scanning");
            report.interrupted = true;
            return Ok(report);
        }

        self.process(entries, &mut report);
        Ok(report)
    }

    /// Deduplicate a file list collected elsewhere.
    ///
    /// Entries are bucketed with the configured minimum size; the extension
    /// filter is not applied.
    pub fn run_files(&self, entries: Vec<FileEntry>) -> RunReport {
        let mut report = RunReport {
            scan: ScanSummary {
                files: entries.len(),
                errors: 0,
                bytes: entries.iter().map(|e| e.size).sum(),
            },
            ..RunReport::default()
        };
        self.process(entries, &mut report);
        report
    }

    fn scan(&self, root: &Path, summary: &mut ScanSummary) -> Vec<FileEntry> {
        if let Some(ref callback) = self.progress {
            callback.on_phase_start(PHASE_SCAN, 0);
        }

        let mut walker = Walker::new(root, self.config.walker.clone());
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        let mut entries = Vec::new();
        for result in walker.walk() {
            match result {
                Ok(entry) => {
                    summary.files += 1;
                    summary.bytes += entry.size;
                    if let Some(ref callback) = self.progress {
                        callback.on_progress(summary.files, &entry.path.to_string_lossy());
                    }
                    entries.push(entry);
                }
                Err(e) => {
                    log::warn!("Skipping: {e}");
                    summary.errors += 1;
                }
            }
        }

        if let Some(ref callback) = self.progress {
            callback.on_phase_end(PHASE_SCAN);
        }
        entries
    }

    fn process(&self, entries: Vec<FileEntry>, report: &mut RunReport) {
        let started = Instant::now();
        let (buckets, bucket_stats) = group_by_size(entries, self.config.walker.min_size);
        log::info!(
            "{} files in {} size buckets ({:.1}% eliminated by size)",
            bucket_stats.candidates,
            bucket_stats.buckets,
            bucket_stats.elimination_rate()
        );
        report.buckets = bucket_stats;

        if let Some(ref callback) = self.progress {
            callback.on_phase_start(PHASE_PARTITION, buckets.len());
        }

        let mut partitioner = ContentPartitioner::new(&self.fs, self.config.partition);
        for (index, bucket) in buckets.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::info!("Interrupted before bucket of {} bytes", bucket.size);
                report.interrupted = true;
                break;
            }

            log::debug!(
                "Comparing {} files of {} bytes",
                bucket.len(),
                bucket.size
            );
            let outcome = partitioner.partition(bucket);
            report.partition.merge(&outcome.stats);
            report.anomalies.extend(outcome.anomalies);

            for group in outcome.groups {
                log::info!(
                    "Duplicate group #{}: {} files of {} bytes, master {}",
                    report.groups.len() + 1,
                    group.len(),
                    group.size,
                    group.master().unwrap_or(Path::new("")).display()
                );
                report.groups.push(group);
            }

            if let Some(ref callback) = self.progress {
                let label = bucket
                    .paths
                    .iter()
                    .next()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                callback.on_progress(index + 1, &label);
            }
        }

        if let Some(ref callback) = self.progress {
            callback.on_phase_end(PHASE_PARTITION);
        }
        report.durations.partition = started.elapsed();

        if report.interrupted {
            return;
        }

        let started = Instant::now();
        self.link_groups(report);
        report.durations.link = started.elapsed();

        log::info!(
            "Done: {} groups, {} linked, {} already linked, {} skipped, {} reclaimed",
            report.groups.len(),
            report.linked_count(),
            report.already_linked_count(),
            report.skipped_count(),
            bytesize::ByteSize::b(report.bytes_reclaimed())
        );
    }

    fn link_groups(&self, report: &mut RunReport) {
        if let Some(ref callback) = self.progress {
            callback.on_phase_start(PHASE_LINK, report.groups.len());
        }

        let dedup = HardLinkDeduplicator::new(&self.fs, self.config.link);
        for (index, group) in report.groups.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::info!("Interrupted before group #{}", index + 1);
                report.interrupted = true;
                break;
            }

            match dedup.deduplicate(group) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    log::error!("Aborting at group #{}: {e}", index + 1);
                    report.fatal = Some(e);
                    break;
                }
            }

            if let Some(ref callback) = self.progress {
                let label = group
                    .master()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                callback.on_progress(index + 1, &label);
            }
        }

        if let Some(ref callback) = self.progress {
            callback.on_phase_end(PHASE_LINK);
        }
    }
}
