//! Storage the store persists through. The filesystem in practice; memory in tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

pub trait StorageGateway: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Reads and writes real files. Parent directories are created on write.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsGateway;

impl StorageGateway for FsGateway {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }
}

/// In-memory files, with switches to make reads or writes fail.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    files: Mutex<HashMap<PathBuf, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let gateway = Self::new();
        gateway.files().insert(path.into(), contents.into());
        gateway
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files().get(path).cloned()
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn files(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageGateway for MemoryGateway {
    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::other("read failure injected"));
        }
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("write failure injected"));
        }
        self.files().insert(path.to_path_buf(), contents.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
