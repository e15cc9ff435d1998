//! Scanner module for directory traversal and file identity.
//!
//! This module provides functionality for:
//! - Recursive directory walking using walkdir (links are never followed)
//! - Extension and minimum-size filtering
//! - Persistent file identity and the filesystem primitives used by the core
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate discovery
//! - [`identity`]: Identity lookup and the [`FileSystem`] trait
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: 16 * 1024,
//!     extension: Some(".iso".to_string()),
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod identity;
pub mod walker;

use std::path::PathBuf;

pub use identity::{FileIdentity, FileStatus, FileSystem, OsFileSystem};
pub use walker::Walker;

/// Files smaller than this are not worth a hard link.
pub const DEFAULT_MIN_SIZE: u64 = 16 * 1024;

/// A file path plus the byte length reported at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes, as reported by the scanner
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkerConfig {
    /// Minimum file size to include (in bytes).
    pub min_size: u64,

    /// Case-insensitive extension filter including the leading dot
    /// (e.g. `.txt`). `None` accepts every file.
    pub extension: Option<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            extension: None,
        }
    }
}

impl WalkerConfig {
    /// Create a new configuration.
    ///
    /// An extension given without its leading dot is normalized to include
    /// one; an empty extension disables filtering.
    #[must_use]
    pub fn new(min_size: u64, extension: Option<String>) -> Self {
        let extension = extension
            .map(|ext| ext.trim().to_string())
            .filter(|ext| !ext.is_empty() && ext != ".")
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            });
        Self {
            min_size,
            extension,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::Io { path: p, .. } => p,
        }
    }
}
