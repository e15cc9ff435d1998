//! File actions module.
//!
//! This module provides the single destructive action of the tool:
//! replacing duplicate files with hard links to a retained master copy.
//!
//! # Linking
//!
//! The link module provides:
//! - Identity checks so existing links are never touched twice
//! - Atomic replacement via a temporary link and rename (default)
//! - Classic delete-then-link for filesystems without rename-over
//! - Dry-run mode that reports what would change
//!
//! ```no_run
//! use linkdupe::actions::{HardLinkDeduplicator, LinkConfig, LinkStrategy};
//! use linkdupe::duplicates::EquivalenceGroup;
//! use linkdupe::scanner::OsFileSystem;
//! use std::path::PathBuf;
//!
//! let group = EquivalenceGroup::new(1 << 20, vec![PathBuf::from("a"), PathBuf::from("b")]);
//! let config = LinkConfig::default().with_strategy(LinkStrategy::Atomic);
//! let outcome = HardLinkDeduplicator::new(&OsFileSystem, config).deduplicate(&group);
//! ```

pub mod link;

pub use link::{
    DedupError, DedupTransaction, FileOutcome, GroupOutcome, HardLinkDeduplicator, LinkConfig,
    LinkStrategy, SkipReason,
};
