//! JSON output formatter for run reports.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "size": 1048576,
//!       "master": "/data/a.iso",
//!       "files": [
//!         { "path": "/data/b.iso", "status": "linked", "reclaimed": 1048576 },
//!         { "path": "/data/c.iso", "status": "skipped", "reason": "on a different device than the master" }
//!       ]
//!     }
//!   ],
//!   "anomalies": [
//!     { "kind": "short_read", "path": "/data/d.iso", "message": "..." }
//!   ],
//!   "summary": {
//!     "files_scanned": 120,
//!     "duplicate_groups": 1,
//!     "linked": 1,
//!     "bytes_reclaimed": 1048576,
//!     "interrupted": false,
//!     "fatal": null,
//!     "exit_code": 0,
//!     "exit_code_name": "LD000"
//!   }
//! }
//! ```
//!
//! A group the link phase never reached has `"files": null`.

use std::io::Write;

use serde::Serialize;

use crate::actions::{FileOutcome, GroupOutcome};
use crate::driver::RunReport;
use crate::duplicates::{Anomaly, EquivalenceGroup};

/// What happened to one duplicate, in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFileOutcome {
    /// Absolute path of the duplicate
    pub path: String,
    /// `linked`, `would_link`, `already_linked` or `skipped`
    pub status: &'static str,
    /// Bytes freed (or that would be)
    pub reclaimed: u64,
    /// Why the file was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl JsonFileOutcome {
    fn from_outcome(outcome: &FileOutcome) -> Self {
        Self {
            path: normalize_path(outcome.path()),
            status: outcome.status(),
            reclaimed: outcome.reclaimed(),
            reason: match outcome {
                FileOutcome::Skipped { reason, .. } => Some(reason.to_string()),
                _ => None,
            },
        }
    }
}

/// A group of identical files in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// File size in bytes
    pub size: u64,
    /// Absolute path of the retained copy
    pub master: String,
    /// One entry per duplicate; `None` if the group was never processed
    pub files: Option<Vec<JsonFileOutcome>>,
    /// Duplicate paths, listed whether or not the group was processed
    pub duplicates: Vec<String>,
}

impl JsonGroup {
    fn new(group: &EquivalenceGroup, outcome: Option<&GroupOutcome>) -> Self {
        Self {
            size: group.size,
            master: group.master().map(normalize_path).unwrap_or_default(),
            files: outcome.map(|o| o.files.iter().map(JsonFileOutcome::from_outcome).collect()),
            duplicates: group
                .duplicates()
                .iter()
                .map(|p| normalize_path(p))
                .collect(),
        }
    }
}

/// A comparison anomaly in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonAnomaly {
    /// Anomaly kind (e.g. `short_read`)
    pub kind: &'static str,
    /// Affected file
    pub path: String,
    /// Human-readable description
    pub message: String,
}

impl From<&Anomaly> for JsonAnomaly {
    fn from(anomaly: &Anomaly) -> Self {
        Self {
            kind: anomaly.kind(),
            path: normalize_path(anomaly.path()),
            message: anomaly.to_string(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Candidate files found by the scan
    pub files_scanned: usize,
    /// Entries skipped because of scan errors
    pub scan_errors: usize,
    /// Total size of the candidate files in bytes
    pub total_size: u64,
    /// Buckets of two or more same-sized files
    pub size_buckets: usize,
    /// Number of groups of identical files
    pub duplicate_groups: usize,
    /// Number of non-master files in those groups
    pub duplicate_files: usize,
    /// Bytes held by the non-master files
    pub wasted_space: u64,
    /// Duplicates replaced by (or, in a dry run, due for) a link
    pub linked: usize,
    /// Duplicates already sharing the master's data
    pub already_linked: usize,
    /// Duplicates left alone
    pub skipped: usize,
    /// Bytes freed
    pub bytes_reclaimed: u64,
    /// Number of comparison anomalies
    pub anomalies: usize,
    /// Peak number of files open at once while comparing
    pub peak_open_handles: usize,
    /// Bytes compared against a pivot
    pub bytes_compared: u64,
    /// Duration of the scan phase in milliseconds
    pub scan_duration_ms: u64,
    /// Duration of the partition phase in milliseconds
    pub partition_duration_ms: u64,
    /// Duration of the link phase in milliseconds
    pub link_duration_ms: u64,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// The error that stopped the link phase
    pub fatal: Option<String>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "LD000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Summarize a run report.
    #[must_use]
    pub fn from_report(report: &RunReport) -> Self {
        let exit_code = report.exit_code();
        Self {
            files_scanned: report.scan.files,
            scan_errors: report.scan.errors,
            total_size: report.scan.bytes,
            size_buckets: report.buckets.buckets,
            duplicate_groups: report.groups.len(),
            duplicate_files: report.groups.iter().map(|g| g.duplicates().len()).sum(),
            wasted_space: report.wasted_space(),
            linked: report.linked_count(),
            already_linked: report.already_linked_count(),
            skipped: report.skipped_count(),
            bytes_reclaimed: report.bytes_reclaimed(),
            anomalies: report.anomalies.len(),
            peak_open_handles: report.partition.peak_open_handles,
            bytes_compared: report.partition.bytes_compared,
            scan_duration_ms: report.durations.scan.as_millis() as u64,
            partition_duration_ms: report.durations.partition.as_millis() as u64,
            link_duration_ms: report.durations.link.as_millis() as u64,
            interrupted: report.interrupted,
            fatal: report.fatal.as_ref().map(ToString::to_string),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Groups of identical files, in the order they were processed
    pub groups: Vec<JsonGroup>,
    /// Comparison anomalies
    pub anomalies: Vec<JsonAnomaly>,
    /// Run summary
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build the JSON view of a run report.
    ///
    /// # Example
    ///
    /// ```
    /// use linkdupe::driver::RunReport;
    /// use linkdupe::output::json::JsonOutput;
    ///
    /// let output = JsonOutput::new(&RunReport::default());
    /// assert!(output.groups.is_empty());
    /// assert_eq!(output.summary.exit_code, 0);
    /// ```
    #[must_use]
    pub fn new(report: &RunReport) -> Self {
        Self {
            groups: report
                .groups
                .iter()
                .enumerate()
                .map(|(i, group)| JsonGroup::new(group, report.outcomes.get(i)))
                .collect(),
            anomalies: report.anomalies.iter().map(JsonAnomaly::from).collect(),
            summary: JsonSummary::from_report(report),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Absolute path string, falling back to the path as given if it cannot be
/// resolved (e.g. a duplicate removed by a failed link).
fn normalize_path(path: &std::path::Path) -> String {
    match path.canonicalize() {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
