//! File access used by the loader and the reload watcher.
//!
//! The core never touches the filesystem directly: everything goes through a
//! [`ResourceReader`], so tests and embedders can serve configuration from
//! memory.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Source of file contents and modification times.
pub trait ResourceReader: Send + Sync {
    /// Read the full contents of a file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Last modification time of a file.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// Reads from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl ResourceReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }
}

/// In-memory file table with explicit modification times.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: RwLock<HashMap<PathBuf, (Vec<u8>, SystemTime)>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file, stamping it with the current time.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.insert_at(path, contents, SystemTime::now());
    }

    /// Insert or replace a file with a specific modification time.
    pub fn insert_at(
        &self,
        path: impl Into<PathBuf>,
        contents: impl Into<Vec<u8>>,
        modified: SystemTime,
    ) {
        self.files
            .write()
            .insert(path.into(), (contents.into(), modified));
    }

    pub fn remove(&self, path: &Path) {
        self.files.write().remove(path);
    }
}

impl ResourceReader for MemoryReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .map(|(contents, _)| contents.clone())
            .ok_or_else(|| not_found(path))
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.files
            .read()
            .get(path)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| not_found(path))
    }
}

/// Modification times of a set of files, each taken just before the file was
/// read. `None` means the file could not be stat'ed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStamps {
    stamps: BTreeMap<PathBuf, Option<SystemTime>>,
}

impl FileStamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `path` with its current modification time. A path that is
    /// already stamped keeps its first stamp.
    pub fn record(&mut self, reader: &dyn ResourceReader, path: &Path) {
        if !self.stamps.contains_key(path) {
            self.stamps
                .insert(path.to_path_buf(), reader.modified(path).ok());
        }
    }

    /// Stamp the same set of paths again with their current times.
    pub fn restat(&self, reader: &dyn ResourceReader) -> FileStamps {
        let stamps = self
            .stamps
            .keys()
            .map(|path| (path.clone(), reader.modified(path).ok()))
            .collect();
        FileStamps { stamps }
    }

    pub fn get(&self, path: &Path) -> Option<Option<SystemTime>> {
        self.stamps.get(path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.stamps.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}
