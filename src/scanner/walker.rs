//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and collecting the candidate files for deduplication.
//!
//! # Features
//!
//! - Sorted, single-threaded traversal (deterministic candidate order)
//! - Symbolic links and reparse points are skipped, never resolved
//! - Case-insensitive extension filtering
//! - Minimum size filtering
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/media"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} candidates", files.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{FileEntry, ScanError, WalkerConfig};

/// Directory walker for candidate discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding candidate files.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration; an inaccessible directory is simply not descended into.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() > 0 && is_link_like(entry) {
                    log::trace!("Skipping link: {}", entry.path().display());
                    return false;
                }
                true
            })
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return false;
                }
                true
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.process_entry(entry),
                Err(e) => Some(Err(handle_walkdir_error(&self.root, e))),
            })
    }

    /// Turn a directory entry into a candidate if it passes every filter.
    fn process_entry(&self, entry: DirEntry) -> Option<Result<FileEntry, ScanError>> {
        if !entry.file_type().is_file() {
            return None;
        }

        if !has_extension(entry.path(), self.config.extension.as_deref()) {
            log::trace!("Skipping file due to extension filter: {}", entry.path().display());
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(handle_walkdir_error(entry.path(), e))),
        };

        let size = metadata.len();
        if size < self.config.min_size {
            log::trace!(
                "Skipping file below minimum size ({} bytes): {}",
                size,
                entry.path().display()
            );
            return None;
        }

        Some(Ok(FileEntry::new(entry.into_path(), size)))
    }
}

/// Check whether a file name carries the given extension.
///
/// The comparison is case-insensitive and covers the text from the last `.`
/// in the file name, so `.txt` matches `notes.TXT` but not `archive.txt.gz`.
/// A `None` filter matches everything.
///
/// # Example
///
/// ```
/// use linkdupe::scanner::walker::has_extension;
/// use std::path::Path;
///
/// assert!(has_extension(Path::new("/a/b/Report.PDF"), Some(".pdf")));
/// assert!(!has_extension(Path::new("/a/b/report"), Some(".pdf")));
/// assert!(has_extension(Path::new("/a/b/report"), None));
/// ```
#[must_use]
pub fn has_extension(path: &Path, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_lowercase(),
        None => return false,
    };

    match name.rfind('.') {
        Some(pos) => name[pos..] == filter.to_lowercase(),
        None => false,
    }
}

/// Symbolic links, and on Windows any reparse point (junctions included).
fn is_link_like(entry: &DirEntry) -> bool {
    if entry.path_is_symlink() || entry.file_type().is_symlink() {
        return true;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        use winapi::um::winnt::FILE_ATTRIBUTE_REPARSE_POINT;

        if let Ok(metadata) = entry.metadata() {
            return metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0;
        }
    }

    false
}

/// Convert a walkdir error into a [`ScanError`].
fn handle_walkdir_error(fallback: &Path, error: walkdir::Error) -> ScanError {
    use std::io::ErrorKind;

    let path = error
        .path()
        .map_or_else(|| fallback.to_path_buf(), Path::to_path_buf);

    match error.io_error().map(std::io::Error::kind) {
        Some(ErrorKind::PermissionDenied) => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path)
        }
        Some(ErrorKind::NotFound) => {
            log::debug!("File not found (may have been deleted): {}", path.display());
            ScanError::NotFound(path)
        }
        _ => {
            log::warn!("Walker error for {}: {}", path.display(), error);
            let source = error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            ScanError::Io { path, source }
        }
    }
}
