//! Equivalence groups produced by content partitioning.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Files proven byte-identical across their full length.
///
/// The first path is the master: the copy that is kept and that every other
/// member is replaced with a hard link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquivalenceGroup {
    /// File size in bytes, shared by every member
    pub size: u64,
    /// Member paths; the master comes first
    pub paths: Vec<PathBuf>,
}

impl EquivalenceGroup {
    /// Create a new group.
    #[must_use]
    pub fn new(size: u64, paths: Vec<PathBuf>) -> Self {
        Self { size, paths }
    }

    /// The retained copy, if the group is non-empty.
    #[must_use]
    pub fn master(&self) -> Option<&Path> {
        self.paths.first().map(PathBuf::as_path)
    }

    /// Every member except the master, in group order.
    #[must_use]
    pub fn duplicates(&self) -> &[PathBuf] {
        self.paths.get(1..).unwrap_or_default()
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Space held by the redundant copies (all copies minus one).
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicates().len() as u64
    }
}
