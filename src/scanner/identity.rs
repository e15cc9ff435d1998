//! Persistent file identity and the filesystem primitives the core relies on.
//!
//! # Overview
//!
//! Two directory entries are hard links to the same data exactly when they
//! share a persistent identity. This module exposes that identity, together
//! with the handful of filesystem calls the partitioner and the deduplicator
//! need, behind the [`FileSystem`] trait so both can be exercised against an
//! instrumented implementation in tests.
//!
//! # Platform Support
//!
//! - **Unix**: `(st_dev, st_ino)` and `st_nlink` from file metadata
//! - **Windows**: `(dwVolumeSerialNumber, nFileIndexHigh:nFileIndexLow)` and
//!   `nNumberOfLinks` from `GetFileInformationByHandle`
//! - **Other**: identity lookups fail with [`io::ErrorKind::Unsupported`]
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::scanner::identity::{FileSystem, OsFileSystem};
//! use std::path::Path;
//!
//! let fs = OsFileSystem;
//! let a = fs.status(Path::new("a.bin")).unwrap();
//! let b = fs.status(Path::new("b.bin")).unwrap();
//! if a.identity == b.identity {
//!     println!("a.bin and b.bin are already the same file");
//! }
//! ```

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use serde::Serialize;

/// Stable identifier shared by every hard link to the same underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileIdentity {
    /// Device (Unix) or volume serial number (Windows)
    pub device: u64,
    /// Inode (Unix) or file index (Windows)
    pub index: u64,
}

impl FileIdentity {
    /// Create an identity from a device/volume id and a per-device index.
    #[must_use]
    pub const fn new(device: u64, index: u64) -> Self {
        Self { device, index }
    }

    /// Whether both identities live on the same device, a precondition for
    /// hard linking one to the other.
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        self.device == other.device
    }
}

/// Result of a single identity lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    /// Persistent identity of the file's data
    pub identity: FileIdentity,
    /// Number of directory entries referring to the data
    pub link_count: u64,
    /// Current length in bytes
    pub len: u64,
}

/// Filesystem primitives required by the comparison and linking phases.
///
/// Implementations must be usable from a single thread; nothing here is
/// required to be `Sync`.
pub trait FileSystem {
    /// Sequential reader returned by [`open_at`](Self::open_at).
    ///
    /// Dropping the reader releases the underlying handle.
    type Reader: Read;

    /// Open a file for sequential binary reading, positioned at `offset`.
    fn open_at(&self, path: &Path, offset: u64) -> io::Result<Self::Reader>;

    /// Look up the persistent identity, link count and length of a file.
    fn status(&self, path: &Path) -> io::Result<FileStatus>;

    /// Remove a directory entry.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create a new hard link at `link` pointing to the data of `original`.
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// Rename `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    type Reader = File;

    fn open_at(&self, path: &Path, offset: u64) -> io::Result<File> {
        let mut file = File::open(path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        Ok(file)
    }

    fn status(&self, path: &Path) -> io::Result<FileStatus> {
        query_status(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

#[cfg(unix)]
fn query_status(path: &Path) -> io::Result<FileStatus> {
    use std::os::unix::fs::MetadataExt;

    let metadata = fs::metadata(path)?;
    Ok(FileStatus {
        identity: FileIdentity::new(metadata.dev(), metadata.ino()),
        link_count: metadata.nlink(),
        len: metadata.len(),
    })
}

#[cfg(windows)]
fn query_status(path: &Path) -> io::Result<FileStatus> {
    use std::os::windows::fs::OpenOptionsExt;
    use std::os::windows::io::AsRawHandle;
    use winapi::um::fileapi::{GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION};
    use winapi::um::winbase::FILE_FLAG_BACKUP_SEMANTICS;
    use winapi::um::winnt::{FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, HANDLE};

    // Attribute-only access: the file may be open elsewhere without sharing read.
    let file = fs::OpenOptions::new()
        .access_mode(0)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)?;

    // SAFETY: the handle is owned by `file` and outlives the call; `info` is
    // a plain C struct fully written by the call on success.
    let info = unsafe {
        let mut info: BY_HANDLE_FILE_INFORMATION = std::mem::zeroed();
        if GetFileInformationByHandle(file.as_raw_handle() as HANDLE, &mut info) == 0 {
            return Err(io::Error::last_os_error());
        }
        info
    };

    Ok(FileStatus {
        identity: FileIdentity::new(
            u64::from(info.dwVolumeSerialNumber),
            (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow),
        ),
        link_count: u64::from(info.nNumberOfLinks),
        len: (u64::from(info.nFileSizeHigh) << 32) | u64::from(info.nFileSizeLow),
    })
}

#[cfg(not(any(unix, windows)))]
fn query_status(_path: &Path) -> io::Result<FileStatus> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "persistent file identity is not available on this platform",
    ))
}

/// Check whether persistent identity lookups work on this platform.
#[must_use]
pub const fn is_supported() -> bool {
    cfg!(any(unix, windows))
}
