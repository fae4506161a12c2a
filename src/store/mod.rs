//! Durable configuration storage.
//!
//! `ConfigStore` owns the in-memory copy of the device configuration and
//! commits changes through a `StorageBackend`, so the device keeps its
//! configuration across the very restart that a network change triggers.

pub mod config_store;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use config_store::ConfigStore;
pub use error::StoreError;
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use traits::{StorageBackend, StoredDocument, STORAGE_FORMAT_VERSION};
