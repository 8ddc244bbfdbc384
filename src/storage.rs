//! Storage abstraction consumed by the patch orchestrator.
//!
//! The engine never opens files itself. [`LocalStorage`] writes through to
//! disk; [`MemoryStorage`] keeps files in a map for staging and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::util::atomic::atomic_write;

/// File operations the patch orchestrator needs.
pub trait Storage: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;
    fn delete(&self, path: &Path) -> io::Result<()>;
    /// Create `path` and any missing parents.
    fn mkdir(&self, path: &Path) -> io::Result<()>;
}

/// Local filesystem adapter. Writes are atomic (tempfile + rename).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        atomic_write(path, content)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

/// In-memory adapter.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.lock().files.insert(path.into(), content.into());
        self
    }

    /// Current content of `path`, if present.
    pub fn get(&self, path: &Path) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().files.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {}", path.display()),
    )
}

impl Storage for MemoryStorage {
    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        self.lock().files.get(path).cloned().ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        self.lock().files.insert(path.to_path_buf(), content.to_owned());
        Ok(())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        for dir in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
            state.dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new().with_file("/w/a.txt", "one");
        assert!(storage.exists(Path::new("/w/a.txt")));
        assert_eq!(storage.read(Path::new("/w/a.txt")).expect("read"), "one");

        storage.write(Path::new("/w/b.txt"), "two").expect("write");
        storage.delete(Path::new("/w/a.txt")).expect("delete");
        assert_eq!(storage.paths(), vec![PathBuf::from("/w/b.txt")]);
        assert!(storage.delete(Path::new("/w/a.txt")).is_err());
    }

    #[test]
    fn test_memory_storage_mkdir_marks_ancestors() {
        let storage = MemoryStorage::new();
        storage.mkdir(Path::new("/w/src/nested")).expect("mkdir");
        assert!(storage.exists(Path::new("/w/src")));
        assert!(storage.exists(Path::new("/w/src/nested")));
    }

    #[test]
    fn test_local_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a/b");
        let storage = LocalStorage;
        storage.mkdir(&nested).expect("mkdir");
        let file = nested.join("f.txt");
        storage.write(&file, "content").expect("write");
        assert!(storage.exists(&file));
        assert_eq!(storage.read(&file).expect("read"), "content");
        storage.delete(&file).expect("delete");
        assert!(!storage.exists(&file));
    }
}
