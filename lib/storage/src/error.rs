//! Error types for device-local storage.

use std::fmt;

/// Errors from device-local storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying storage backend failed.
    Backend { message: String },
    /// A stored value could not be serialized or deserialized.
    Serialization { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { message } => write!(f, "storage backend error: {message}"),
            Self::Serialization { message } => {
                write!(f, "storage serialization error: {message}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
