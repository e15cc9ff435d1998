//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the linkdupe application.
///
/// - 0: Success (completed normally, whether or not duplicates were found)
/// - 1: General error (bad arguments, unreadable root, invalid config)
/// - 2: Deduplication aborted (a master file's identity could not be read)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed.
    Success = 0,
    /// General error: the run could not start or failed unexpectedly.
    GeneralError = 1,
    /// Deduplication aborted: processing stopped at a group whose master
    /// could not be identified.
    DedupAborted = 2,
    /// Interrupted: the run was stopped by Ctrl+C between groups.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "LD000",
            Self::GeneralError => "LD001",
            Self::DedupAborted => "LD002",
            Self::Interrupted => "LD130",
        }
    }

    /// Whether the code reports a failure.
    #[must_use]
    pub fn is_failure(self) -> bool {
        self != Self::Success
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "LD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
