//! Atomic file writing via tempfile + rename.
//!
//! Uses [`tempfile::NamedTempFile`] to write to a temporary file in the same
//! directory as the target, then atomically renames it, so a patched file is
//! never observed half-written.

use std::io::{self, Write};
use std::path::Path;

/// Atomically write `content` to `path`.
///
/// The parent directory must exist.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file.txt");
        atomic_write(&path, "first\n").expect("write");
        atomic_write(&path, "second\n").expect("overwrite");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "second\n");
    }

    #[test]
    fn test_atomic_write_missing_parent_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("file.txt");
        assert!(atomic_write(&path, "x").is_err());
    }
}
