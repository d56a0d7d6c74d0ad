//! Flat-directory file access used by the persistence and profile layers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StoreError;

/// The handful of whole-file operations the core needs from a single flat
/// directory. Names are bare file names, never paths.
pub trait FileStore {
    /// Full path of `name`, used for messages.
    fn path_of(&self, name: &str) -> PathBuf;

    /// Names of all regular files in the directory.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    fn exists(&self, name: &str) -> bool;

    /// Whole-file read. `Ok(None)` when the file does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the file with `contents`.
    fn write(&self, name: &str, contents: &[u8]) -> Result<(), StoreError>;

    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError>;

    fn remove(&self, name: &str) -> Result<(), StoreError>;

    fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        match self.read(from)? {
            Some(bytes) => self.write(to, &bytes),
            None => Err(StoreError::io(
                self.path_of(from),
                io::Error::new(io::ErrorKind::NotFound, "source file missing"),
            )),
        }
    }
}

/// [`FileStore`] backed by a real directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash mid-write leaves the old file intact.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Use `root` as the data directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for DirStore {
    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_of(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<(), StoreError> {
        let path = self.path_of(name);
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| StoreError::io(&path, e))?;
        tmp.write_all(contents)
            .and_then(|_| tmp.flush())
            .map_err(|e| StoreError::io(&path, e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::io(&path, e.error))?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.path_of(from);
        std::fs::rename(&src, self.path_of(to)).map_err(|e| StoreError::io(src, e))
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_of(name);
        std::fs::remove_file(&path).map_err(|e| StoreError::io(path, e))
    }
}
