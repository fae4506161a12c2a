//! The configuration store: single source of truth for the three sections.

use super::error::StoreError;
use super::traits::{StorageBackend, StoredDocument, STORAGE_FORMAT_VERSION};
use crate::state::{
    CommConfig, DeviceConfig, GpioConfig, NetworkConfig, SectionName, SectionValue,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{info, warn};

/// Durable holder of the device configuration.
///
/// Readers take a snapshot under a read lock and never see a half-applied
/// section. A commit builds the next document from the latest committed one,
/// persists it, and only then publishes it to readers; if the durable write
/// fails, readers keep seeing the last durable value.
#[derive(Debug)]
pub struct ConfigStore {
    backend: Arc<dyn StorageBackend>,
    current: RwLock<DeviceConfig>,
    /// Serialises durable writes. The document holds every section, so two
    /// concurrent commits to different sections must not overwrite each other.
    persist_lock: Mutex<()>,
}

impl ConfigStore {
    /// Open the store, loading whatever the backend holds.
    ///
    /// On first boot, or when the stored document is unreadable or of an
    /// unknown version, `factory` is written durably and used.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        factory: DeviceConfig,
    ) -> Result<Self, StoreError> {
        let location = backend.describe();
        let loaded = match backend.load() {
            Ok(Some(doc)) if doc.version == STORAGE_FORMAT_VERSION => {
                info!(
                    location = %location,
                    saved_at = %doc.saved_at,
                    "loaded stored device configuration"
                );
                Some(doc.config)
            }
            Ok(Some(doc)) => {
                warn!(
                    location = %location,
                    found = doc.version,
                    expected = STORAGE_FORMAT_VERSION,
                    "stored configuration has an unknown format version, using factory defaults"
                );
                backend.quarantine()?;
                None
            }
            Ok(None) => {
                info!(location = %location, "no stored configuration, writing factory defaults");
                None
            }
            Err(StoreError::Corrupt(reason)) => {
                warn!(location = %location, %reason, "stored configuration is corrupt, using factory defaults");
                backend.quarantine()?;
                None
            }
            Err(e) => return Err(e),
        };

        let current = match loaded {
            Some(config) => config,
            None => {
                backend.persist(&StoredDocument::new(factory.clone()))?;
                factory
            }
        };

        Ok(Self {
            backend,
            current: RwLock::new(current),
            persist_lock: Mutex::new(()),
        })
    }

    /// Consistent copy of every section.
    pub fn snapshot(&self) -> DeviceConfig {
        self.current.read().clone()
    }

    pub fn get(&self, section: SectionName) -> SectionValue {
        self.current.read().section(section)
    }

    pub fn network(&self) -> NetworkConfig {
        self.current.read().network.clone()
    }

    pub fn comm(&self) -> CommConfig {
        self.current.read().comm
    }

    pub fn gpio(&self) -> GpioConfig {
        self.current.read().gpio
    }

    /// The hardware address recorded at first boot.
    pub fn mac(&self) -> String {
        self.current.read().network.mac.clone()
    }

    /// Atomically replace one section.
    ///
    /// The stored MAC address always survives a network commit regardless of
    /// what `value` carries.
    pub fn commit(&self, value: SectionValue) -> Result<(), StoreError> {
        self.commit_with(move |doc| match value {
            SectionValue::Network(mut network) => {
                network.mac = doc.network.mac.clone();
                doc.network = network;
            }
            SectionValue::Comm(comm) => doc.comm = comm,
            SectionValue::Gpio(gpio) => doc.gpio = gpio,
        })
    }

    /// Atomically replace every section (factory reset). The MAC address is kept.
    pub fn commit_all(&self, config: DeviceConfig) -> Result<(), StoreError> {
        self.commit_with(move |doc| {
            let mac = doc.network.mac.clone();
            *doc = config;
            doc.network.mac = mac;
        })
    }

    /// Push buffered writes to stable storage.
    pub fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.persist_lock.lock();
        self.backend.flush()
    }

    fn commit_with(&self, apply: impl FnOnce(&mut DeviceConfig)) -> Result<(), StoreError> {
        let _guard = self.persist_lock.lock();

        let mut next = self.current.read().clone();
        apply(&mut next);

        // Readers keep the last durable value until the write has succeeded.
        self.backend.persist(&StoredDocument::new(next.clone()))?;
        *self.current.write() = next;
        Ok(())
    }
}
