//! Shared helpers for integration tests.
#![allow(dead_code)]

use linkdupe::scanner::{FileStatus, FileSystem, OsFileSystem};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Write `content` to `name` inside `dir` and return the full path.
pub fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Deterministic pseudo-random content.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Whether two paths name the same underlying file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    let (sa, sb) = (
        OsFileSystem.status(a).unwrap(),
        OsFileSystem.status(b).unwrap(),
    );
    sa.identity == sb.identity
}

/// Real filesystem that records handle usage and mutations, and can be told
/// to fail calls for chosen paths.
#[derive(Debug, Default)]
pub struct RecordingFs {
    open: Rc<Cell<usize>>,
    peak: Rc<Cell<usize>>,
    pub removes: Cell<usize>,
    pub links: Cell<usize>,
    pub renames: Cell<usize>,
    pub fail_status: RefCell<HashSet<PathBuf>>,
    pub fail_open: RefCell<HashSet<PathBuf>>,
}

impl RecordingFs {
    pub fn failing_status(path: &Path) -> Self {
        let fs = Self::default();
        fs.fail_status.borrow_mut().insert(path.to_path_buf());
        fs
    }

    pub fn peak_open(&self) -> usize {
        self.peak.get()
    }

    pub fn open_now(&self) -> usize {
        self.open.get()
    }

    pub fn mutations(&self) -> usize {
        self.removes.get() + self.links.get() + self.renames.get()
    }
}

pub struct RecordingReader {
    file: File,
    open: Rc<Cell<usize>>,
}

impl Read for RecordingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Drop for RecordingReader {
    fn drop(&mut self) {
        self.open.set(self.open.get() - 1);
    }
}

fn injected() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "injected failure")
}

impl FileSystem for RecordingFs {
    type Reader = RecordingReader;

    fn open_at(&self, path: &Path, offset: u64) -> io::Result<RecordingReader> {
        if self.fail_open.borrow().contains(path) {
            return Err(injected());
        }
        let file = OsFileSystem.open_at(path, offset)?;
        self.open.set(self.open.get() + 1);
        self.peak.set(self.peak.get().max(self.open.get()));
        Ok(RecordingReader {
            file,
            open: Rc::clone(&self.open),
        })
    }

    fn status(&self, path: &Path) -> io::Result<FileStatus> {
        if self.fail_status.borrow().contains(path) {
            return Err(injected());
        }
        OsFileSystem.status(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.removes.set(self.removes.get() + 1);
        OsFileSystem.remove_file(path)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        self.links.set(self.links.get() + 1);
        OsFileSystem.hard_link(original, link)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.renames.set(self.renames.get() + 1);
        OsFileSystem.rename(from, to)
    }
}
