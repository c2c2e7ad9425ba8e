//! The durable cached-user mirror.
//!
//! The last resolved user is mirrored to device storage under one fixed
//! key so the UI can paint a name while resolution runs. The mirror is
//! evidence, never a trust source: when the remote check cannot confirm
//! a live session, the mirror is deleted and the user re-authenticates.

use crate::profile::Profile;
use crate::session::Session;
use chrono::{DateTime, Utc};
use nestline_core::UserId;
use nestline_storage::{DeviceStorage, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed storage key for the cached user. Not per-user: the mirror
/// tracks whoever was resolved last on this device.
pub const CACHED_USER_KEY: &str = "nestline_cached_user";

/// The device-local mirror of the last resolved user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedUser {
    /// Backend-issued user ID.
    pub user_id: UserId,
    /// Account email at resolution time.
    pub email: String,
    /// The merged profile at resolution time.
    pub profile: Profile,
    /// When this mirror was written.
    pub cached_at: DateTime<Utc>,
}

impl CachedUser {
    /// Snapshots a session into its durable mirror form.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id().clone(),
            email: session.email().unwrap_or_default().to_string(),
            profile: session.profile().clone(),
            cached_at: Utc::now(),
        }
    }
}

/// Typed store for the cached-user mirror over [`DeviceStorage`].
#[derive(Debug)]
pub struct CachedUserStore<S: DeviceStorage> {
    storage: Arc<S>,
}

impl<S: DeviceStorage> CachedUserStore<S> {
    /// Creates a store backed by the given device storage.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Loads the mirror, if one exists.
    ///
    /// A mirror that fails to parse is treated as absent; stale formats
    /// from older app versions must not wedge resolution.
    pub async fn load(&self) -> Result<Option<CachedUser>, StorageError> {
        let Some(json) = self.storage.get_item(CACHED_USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                tracing::warn!(error = %e, "cached user failed to parse, discarding");
                self.storage.remove_item(CACHED_USER_KEY).await?;
                Ok(None)
            }
        }
    }

    /// Writes the mirror, replacing any previous one.
    pub async fn save(&self, cached: &CachedUser) -> Result<(), StorageError> {
        let json = serde_json::to_string(cached)?;
        self.storage.set_item(CACHED_USER_KEY, &json).await
    }

    /// Deletes the mirror. Deleting a missing mirror is not an error.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(CACHED_USER_KEY).await
    }
}

impl<S: DeviceStorage> Clone for CachedUserStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}
