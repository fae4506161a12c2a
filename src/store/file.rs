//! File-backed storage.
//!
//! The document is written as pretty JSON to a temporary file in the target
//! directory, fsync'd, and renamed over the target. A crash at any point
//! leaves either the old or the new document on disk, never a torn one.

use super::error::StoreError;
use super::traits::{StorageBackend, StoredDocument};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Storage backend that keeps the document in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }

    /// Where an unreadable document is moved by [`StorageBackend::quarantine`].
    pub fn quarantine_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<Option<StoredDocument>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn persist(&self, document: &StoredDocument) -> Result<(), StoreError> {
        let dir = self.directory();
        fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let bytes = serde_json::to_vec_pretty(document)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(&bytes).map_err(|e| self.write_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        sync_directory(&dir).map_err(|e| self.write_error(e))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "configuration persisted");
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        match fs::File::open(&self.path) {
            Ok(file) => file.sync_all().map_err(|e| self.write_error(e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.write_error(e)),
        }
        sync_directory(&self.directory()).map_err(|e| self.write_error(e))
    }

    fn quarantine(&self) -> Result<(), StoreError> {
        let target = self.quarantine_path();
        warn!(
            from = %self.path.display(),
            to = %target.display(),
            "moving unreadable configuration aside"
        );
        match fs::rename(&self.path, &target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.write_error(e)),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Make a completed rename durable by syncing the containing directory.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
