//! Storage backend abstraction.
//!
//! The `StorageBackend` trait lets the config store persist to a real file on
//! the device or to memory in tests, with the same commit semantics.

use super::error::StoreError;
use crate::state::DeviceConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the persisted document layout. Bump when the layout changes.
pub const STORAGE_FORMAT_VERSION: u32 = 1;

/// What actually gets written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub config: DeviceConfig,
}

impl StoredDocument {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            version: STORAGE_FORMAT_VERSION,
            saved_at: Utc::now(),
            config,
        }
    }
}

/// Durable storage for the device configuration document.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Load the stored document.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet (first boot) and
    /// `Err(StoreError::Corrupt)` when something is stored but unreadable.
    fn load(&self) -> Result<Option<StoredDocument>, StoreError>;

    /// Durably replace the stored document.
    ///
    /// Must either fully succeed or leave the previous document in place.
    fn persist(&self, document: &StoredDocument) -> Result<(), StoreError>;

    /// Push any buffered writes down to stable storage.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Move an unreadable document out of the way so defaults can be written.
    fn quarantine(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}
