//! Per-user application-form draft persistence.
//!
//! The multi-step application forms save their in-progress state locally
//! so a user can close the app (or defer account creation during lazy
//! signup) and resume later. Drafts live under one key per user,
//! `draft_{user_id}`, and are cleared on logout.

use crate::device::DeviceStorage;
use crate::error::StorageError;
use nestline_core::UserId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Typed store for per-user form drafts over [`DeviceStorage`].
#[derive(Debug)]
pub struct DraftStore<S: DeviceStorage> {
    storage: Arc<S>,
}

impl<S: DeviceStorage> DraftStore<S> {
    /// Creates a draft store backed by the given device storage.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Returns the storage key for a user's draft.
    #[must_use]
    pub fn key_for(user_id: &UserId) -> String {
        format!("draft_{user_id}")
    }

    /// Saves a draft for the user, replacing any previous draft.
    pub async fn save<T: Serialize + Sync>(
        &self,
        user_id: &UserId,
        draft: &T,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(draft)?;
        self.storage.set_item(&Self::key_for(user_id), &json).await
    }

    /// Loads the user's draft, if one exists.
    pub async fn load<T: DeserializeOwned>(
        &self,
        user_id: &UserId,
    ) -> Result<Option<T>, StorageError> {
        let Some(json) = self.storage.get_item(&Self::key_for(user_id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Deletes the user's draft. Deleting a missing draft is not an error.
    pub async fn clear(&self, user_id: &UserId) -> Result<(), StorageError> {
        self.storage.remove_item(&Self::key_for(user_id)).await
    }
}

impl<S: DeviceStorage> Clone for DraftStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}
