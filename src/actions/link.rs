//! Replacing duplicate files with hard links to a master copy.
//!
//! # Overview
//!
//! [`HardLinkDeduplicator`] takes one [`EquivalenceGroup`] and makes every
//! member after the first a hard link to the first (the master):
//!
//! 1. The master's identity and link count are looked up. Failure here is the
//!    only fatal condition and is returned as [`DedupError::MasterIdentity`].
//! 2. Each duplicate is looked up in turn. A duplicate that already shares the
//!    master's identity is left alone, as is one that cannot be looked up,
//!    lives on another device, or changed size since comparison.
//! 3. The duplicate's directory entry is replaced with a link to the master.
//!
//! Every per-file problem becomes a [`FileOutcome::Skipped`] and processing
//! moves on to the next duplicate.
//!
//! # Strategies
//!
//! - [`LinkStrategy::Atomic`] (default): link the master at a temporary
//!   sibling path, then rename it over the duplicate. The duplicate path always
//!   names either the old copy or the master's data.
//! - [`LinkStrategy::DeleteThenLink`]: remove the duplicate, then link the
//!   master at its path. If the link fails the duplicate stays deleted.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::actions::link::{HardLinkDeduplicator, LinkConfig};
//! use linkdupe::duplicates::EquivalenceGroup;
//! use linkdupe::scanner::OsFileSystem;
//! use std::path::PathBuf;
//!
//! let group = EquivalenceGroup::new(
//!     65_536,
//!     vec![PathBuf::from("a.iso"), PathBuf::from("b.iso")],
//! );
//!
//! let fs = OsFileSystem;
//! let dedup = HardLinkDeduplicator::new(&fs, LinkConfig::default());
//! match dedup.deduplicate(&group) {
//!     Ok(outcome) => println!("{} linked", outcome.linked_count()),
//!     Err(e) => eprintln!("aborting: {e}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duplicates::EquivalenceGroup;
use crate::scanner::{FileIdentity, FileStatus, FileSystem};

/// How a duplicate's directory entry is replaced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStrategy {
    /// Link at a temporary path, then rename over the duplicate.
    #[default]
    Atomic,
    /// Remove the duplicate, then link at its path.
    DeleteThenLink,
}

impl fmt::Display for LinkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic => write!(f, "atomic"),
            Self::DeleteThenLink => write!(f, "delete-then-link"),
        }
    }
}

/// Configuration for the link phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkConfig {
    /// Replacement strategy
    pub strategy: LinkStrategy,
    /// Run every check but change nothing
    pub dry_run: bool,
}

impl LinkConfig {
    /// Set the replacement strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: LinkStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// The master of a group and the duplicates to be linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupTransaction {
    /// Retained copy
    pub master: PathBuf,
    /// Identity of the master's data
    pub master_identity: FileIdentity,
    /// Master link count before any change
    pub master_link_count: u64,
    /// Paths to replace, in group order
    pub duplicates: Vec<PathBuf>,
}

/// Why a duplicate was left as it was (or, for a failed link after removal,
/// as it ended up).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The duplicate's identity could not be determined.
    #[error("identity lookup failed: {error}")]
    IdentityLookup {
        /// Error description
        error: String,
    },

    /// The duplicate is on another device than the master.
    #[error("on a different device than the master")]
    CrossDevice,

    /// The duplicate's size changed since it was compared.
    #[error("size changed since comparison ({actual} bytes, expected {expected})")]
    Modified {
        /// Size at comparison time
        expected: u64,
        /// Current size
        actual: u64,
    },

    /// The master's size changed since it was compared.
    #[error("master size changed since comparison ({actual} bytes, expected {expected})")]
    MasterModified {
        /// Size at comparison time
        expected: u64,
        /// Current size
        actual: u64,
    },

    /// The duplicate could not be removed.
    #[error("could not remove duplicate: {error}")]
    RemoveFailed {
        /// Error description
        error: String,
    },

    /// The hard link could not be created.
    #[error("could not create hard link: {error}{}", removed_note(.removed))]
    LinkFailed {
        /// Error description
        error: String,
        /// Whether the duplicate's entry had already been removed
        removed: bool,
    },

    /// The temporary link could not be renamed over the duplicate.
    #[error("could not rename temporary link over duplicate: {error}")]
    RenameFailed {
        /// Error description
        error: String,
    },
}

fn removed_note(removed: &bool) -> &'static str {
    if *removed {
        " (duplicate was already removed)"
    } else {
        ""
    }
}

/// What happened to one duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Replaced with a hard link to the master.
    Linked {
        /// Duplicate path
        path: PathBuf,
        /// Bytes freed by the replacement
        reclaimed: u64,
    },
    /// Would have been replaced (dry run).
    WouldLink {
        /// Duplicate path
        path: PathBuf,
        /// Bytes that would be freed
        reclaimed: u64,
    },
    /// Already a hard link to the master.
    AlreadyLinked {
        /// Duplicate path
        path: PathBuf,
    },
    /// Left alone because of a per-file problem.
    Skipped {
        /// Duplicate path
        path: PathBuf,
        /// Why
        reason: SkipReason,
    },
}

impl FileOutcome {
    /// Short machine-readable name of the outcome.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Linked { .. } => "linked",
            Self::WouldLink { .. } => "would_link",
            Self::AlreadyLinked { .. } => "already_linked",
            Self::Skipped { .. } => "skipped",
        }
    }

    /// The duplicate this outcome is about.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Linked { path, .. }
            | Self::WouldLink { path, .. }
            | Self::AlreadyLinked { path }
            | Self::Skipped { path, .. } => path,
        }
    }

    /// Bytes freed (or that would be freed) by this outcome.
    #[must_use]
    pub fn reclaimed(&self) -> u64 {
        match self {
            Self::Linked { reclaimed, .. } | Self::WouldLink { reclaimed, .. } => *reclaimed,
            _ => 0,
        }
    }
}

/// Outcome of deduplicating one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    /// Shared file size of the group
    pub size: u64,
    /// Master and duplicates; `None` for groups with nothing to do
    pub transaction: Option<DedupTransaction>,
    /// One outcome per duplicate, in group order
    pub files: Vec<FileOutcome>,
}

impl GroupOutcome {
    /// Number of duplicates replaced with links.
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Linked { .. } | FileOutcome::WouldLink { .. }))
            .count()
    }

    /// Number of duplicates already linked to the master.
    #[must_use]
    pub fn already_linked_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::AlreadyLinked { .. }))
            .count()
    }

    /// Number of duplicates skipped because of a problem.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Skipped { .. }))
            .count()
    }

    /// Total bytes reclaimed across the group.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.files.iter().map(FileOutcome::reclaimed).sum()
    }
}

/// Fatal error for a group: nothing further should be processed.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The master's identity could not be determined.
    #[error("cannot determine identity of master file {path}: {source}")]
    MasterIdentity {
        /// Master path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl DedupError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::MasterIdentity { path, .. } => path,
        }
    }
}

/// Replaces duplicates in an equivalence group with hard links to its master.
#[derive(Debug)]
pub struct HardLinkDeduplicator<'a, F: FileSystem> {
    fs: &'a F,
    config: LinkConfig,
}

impl<'a, F: FileSystem> HardLinkDeduplicator<'a, F> {
    /// Create a deduplicator operating through `fs`.
    #[must_use]
    pub fn new(fs: &'a F, config: LinkConfig) -> Self {
        Self { fs, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> LinkConfig {
        self.config
    }

    /// Deduplicate one group.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::MasterIdentity`] if the master cannot be looked
    /// up. No duplicate is touched in that case.
    pub fn deduplicate(&self, group: &EquivalenceGroup) -> Result<GroupOutcome, DedupError> {
        let Some(master) = group.master().filter(|_| group.len() >= 2) else {
            log::debug!("Group has no duplicates, nothing to do");
            return Ok(GroupOutcome {
                size: group.size,
                transaction: None,
                files: Vec::new(),
            });
        };

        let master_status = self.fs.status(master).map_err(|source| {
            log::error!(
                "Failed to get identity for master file {}: {}",
                master.display(),
                source
            );
            DedupError::MasterIdentity {
                path: master.to_path_buf(),
                source,
            }
        })?;

        log::info!("Master file: {}", master.display());

        let transaction = DedupTransaction {
            master: master.to_path_buf(),
            master_identity: master_status.identity,
            master_link_count: master_status.link_count,
            duplicates: group.duplicates().to_vec(),
        };

        let files = transaction
            .duplicates
            .iter()
            .map(|dup| self.process_duplicate(&transaction, &master_status, group.size, dup))
            .collect();

        Ok(GroupOutcome {
            size: group.size,
            transaction: Some(transaction),
            files,
        })
    }

    fn process_duplicate(
        &self,
        transaction: &DedupTransaction,
        master_status: &FileStatus,
        size: u64,
        dup: &Path,
    ) -> FileOutcome {
        match self.check_and_replace(transaction, master_status, size, dup) {
            Ok(outcome) => outcome,
            Err(reason) => {
                log::warn!("Skipping {}: {}", dup.display(), reason);
                FileOutcome::Skipped {
                    path: dup.to_path_buf(),
                    reason,
                }
            }
        }
    }

    fn check_and_replace(
        &self,
        transaction: &DedupTransaction,
        master_status: &FileStatus,
        size: u64,
        dup: &Path,
    ) -> Result<FileOutcome, SkipReason> {
        if master_status.len != size {
            return Err(SkipReason::MasterModified {
                expected: size,
                actual: master_status.len,
            });
        }

        let status = self
            .fs
            .status(dup)
            .map_err(|e| SkipReason::IdentityLookup {
                error: e.to_string(),
            })?;

        if status.identity == transaction.master_identity {
            log::info!("Skipping file (already linked): {}", dup.display());
            return Ok(FileOutcome::AlreadyLinked {
                path: dup.to_path_buf(),
            });
        }

        if !status.identity.same_device(&transaction.master_identity) {
            return Err(SkipReason::CrossDevice);
        }

        if status.len != size {
            return Err(SkipReason::Modified {
                expected: size,
                actual: status.len,
            });
        }

        // Data is only freed when this entry was its last link.
        let reclaimed = if status.link_count <= 1 { size } else { 0 };

        if self.config.dry_run {
            log::info!(
                "Would replace duplicate {} with hard link to {}",
                dup.display(),
                transaction.master.display()
            );
            return Ok(FileOutcome::WouldLink {
                path: dup.to_path_buf(),
                reclaimed,
            });
        }

        match self.config.strategy {
            LinkStrategy::Atomic => self.replace_atomic(&transaction.master, dup)?,
            LinkStrategy::DeleteThenLink => self.replace_delete_then_link(&transaction.master, dup)?,
        }

        log::info!(
            "Replaced duplicate {} with hard link to {}",
            dup.display(),
            transaction.master.display()
        );
        Ok(FileOutcome::Linked {
            path: dup.to_path_buf(),
            reclaimed,
        })
    }

    fn replace_atomic(&self, master: &Path, dup: &Path) -> Result<(), SkipReason> {
        let temp = temp_link_path(dup);

        self.fs
            .hard_link(master, &temp)
            .map_err(|e| SkipReason::LinkFailed {
                error: e.to_string(),
                removed: false,
            })?;

        if let Err(e) = self.fs.rename(&temp, dup) {
            if let Err(cleanup) = self.fs.remove_file(&temp) {
                log::warn!(
                    "Could not remove temporary link {}: {}",
                    temp.display(),
                    cleanup
                );
            }
            return Err(SkipReason::RenameFailed {
                error: e.to_string(),
            });
        }

        Ok(())
    }

    fn replace_delete_then_link(&self, master: &Path, dup: &Path) -> Result<(), SkipReason> {
        self.fs
            .remove_file(dup)
            .map_err(|e| SkipReason::RemoveFailed {
                error: e.to_string(),
            })?;

        self.fs.hard_link(master, dup).map_err(|e| {
            log::error!(
                "Duplicate {} was removed but linking it to {} failed",
                dup.display(),
                master.display()
            );
            SkipReason::LinkFailed {
                error: e.to_string(),
                removed: true,
            }
        })
    }
}

/// Hidden sibling path used for the temporary link.
#[must_use]
pub fn temp_link_path(dup: &Path) -> PathBuf {
    let name = dup
        .file_name()
        .map_or_else(|| "file".into(), |n| n.to_string_lossy());
    let temp_name = format!(".{}.linkdupe-{}.tmp", name, std::process::id());
    dup.with_file_name(temp_name)
}
