//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based bucketing of scanned files ([`buckets`])
//! - Streaming content partitioning into equivalence groups ([`partition`])
//! - The equivalence group type shared with the link phase ([`groups`])

pub mod buckets;
pub mod groups;
pub mod partition;

pub use buckets::{group_by_size, BucketStats, SizeBucket};
pub use groups::EquivalenceGroup;
pub use partition::{
    Anomaly, ContentPartitioner, GroupKey, PartitionConfig, PartitionOutcome, PartitionStats,
};
