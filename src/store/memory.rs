//! In-memory storage backend for testing.
//!
//! Provides a `MemoryBackend` that behaves like durable storage without
//! touching the filesystem, and can be told to fail so that commit rollback
//! and error reporting can be exercised.

use super::error::StoreError;
use super::traits::{StorageBackend, StoredDocument};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<StoredDocument>,
    /// Simulate an undecodable document on the next load.
    corrupt: bool,
    /// Fail every persist while set.
    fail_persist: bool,
    /// Fail this many upcoming persists, then recover.
    fail_next: usize,
    persist_count: usize,
    flush_count: usize,
    quarantined: usize,
}

/// Storage backend holding the document in memory.
///
/// Clones share state, so a test can keep a handle for inspection after
/// handing one to the store.
///
/// # Example
/// ```
/// use device_config_agent::store::{MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::new();
/// assert!(backend.load().unwrap().is_none());
///
/// backend.fail_next_persists(1);
/// assert_eq!(backend.persist_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing stored document, as if the device had booted before.
    pub fn with_document(document: StoredDocument) -> Self {
        let backend = Self::new();
        backend.state.lock().document = Some(document);
        backend
    }

    /// The document as it currently sits in "durable" storage.
    pub fn stored(&self) -> Option<StoredDocument> {
        self.state.lock().document.clone()
    }

    /// Make every persist fail until cleared.
    pub fn set_fail_persist(&self, fail: bool) {
        self.state.lock().fail_persist = fail;
    }

    /// Make the next `count` persists fail.
    pub fn fail_next_persists(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// Make the next load report a corrupt document.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.state.lock().corrupt = corrupt;
    }

    /// Number of successful persists.
    pub fn persist_count(&self) -> usize {
        self.state.lock().persist_count
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flush_count
    }

    pub fn quarantine_count(&self) -> usize {
        self.state.lock().quarantined
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Option<StoredDocument>, StoreError> {
        let state = self.state.lock();
        if state.corrupt {
            return Err(StoreError::Corrupt("simulated corruption".to_string()));
        }
        Ok(state.document.clone())
    }

    fn persist(&self, document: &StoredDocument) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_persist {
            return Err(StoreError::unavailable("simulated persist failure"));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(StoreError::unavailable("simulated persist failure"));
        }
        state.document = Some(document.clone());
        state.persist_count += 1;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.state.lock().flush_count += 1;
        Ok(())
    }

    fn quarantine(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.document = None;
        state.corrupt = false;
        state.quarantined += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
