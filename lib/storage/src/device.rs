//! The device storage trait and the in-memory implementation.
//!
//! On a device the implementation wraps the platform's key-value storage
//! API. The trait keeps that boundary swappable and lets the auth and
//! draft layers be tested without a device.

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for device-local key-value storage.
///
/// Mirrors the platform storage surface: string keys, string values,
/// removal is idempotent. Implementations must tolerate concurrent
/// readers; writers are expected to come from the main sequential flow.
#[async_trait]
pub trait DeviceStorage: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing a missing key is not
    /// an error.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory [`DeviceStorage`] implementation.
///
/// Used in tests and in host environments without persistent storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.read().expect("storage lock poisoned").len()
    }

    /// Returns true if nothing is stored.
    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeviceStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|e| StorageError::Backend {
            message: e.to_string(),
        })?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|e| StorageError::Backend {
            message: e.to_string(),
        })?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|e| StorageError::Backend {
            message: e.to_string(),
        })?;
        items.remove(key);
        Ok(())
    }
}
