//! Strongly-typed identifier for users.
//!
//! User IDs are issued by the hosted auth backend and are opaque to this
//! codebase: the backend owns their format (UUIDs today), so the newtype
//! wraps the raw string rather than imposing a local format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a user, as issued by the hosted auth backend.
///
/// Treated as an opaque string. Used to key profile records and
/// per-user local storage entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user ID from the backend-issued string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
