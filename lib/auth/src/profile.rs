//! Profile records and best-effort enrichment.
//!
//! A profile is the app-owned database row keyed by the identity's user
//! ID, holding display and application fields the identity claims don't
//! carry. Enrichment merges it over the identity's raw metadata through
//! [`merge_profile`]: the stored record wins, metadata is the fallback,
//! and missing fields degrade to empty strings rather than failing the
//! session.

use crate::error::ProfileError;
use crate::identity::Identity;
use async_trait::async_trait;
use nestline_core::UserId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The role a user holds on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A surrogate applicant or matched surrogate. The default when no
    /// role has been recorded.
    #[default]
    Surrogate,
    /// An intended parent.
    IntendedParent,
    /// Agency staff with dashboard access.
    Admin,
}

impl Role {
    /// Parses a stored role string, falling back to the default for
    /// unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "intended_parent" => Self::IntendedParent,
            "admin" => Self::Admin,
            _ => Self::Surrogate,
        }
    }

    /// Returns the canonical stored form of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Surrogate => "surrogate",
            Self::IntendedParent => "intended_parent",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A profile row as stored by the profile store.
///
/// Every field is optional: rows are created incrementally as users move
/// through the application forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Display name.
    pub name: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Stored role string; parsed leniently via [`Role::parse`].
    pub role: Option<String>,
    /// Free-form location.
    pub location: Option<String>,
    /// Date of birth as entered in the application form.
    pub date_of_birth: Option<String>,
    /// Invite code the user signed up with, if any.
    pub invite_code: Option<String>,
    /// Who referred this user, if anyone.
    pub referred_by: Option<String>,
}

/// The merged enrichment attached to a session.
///
/// Fields are plain strings; an empty string means the value is unknown
/// from both the profile store and the identity metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name. Falls back to the identity's email local-part.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Platform role.
    pub role: Role,
    /// Free-form location.
    pub location: String,
    /// Date of birth.
    pub date_of_birth: String,
    /// Invite code used at signup.
    pub invite_code: String,
    /// Who referred this user.
    pub referred_by: String,
    /// The identity's raw metadata claims, kept for fields the typed
    /// profile doesn't model.
    pub metadata: Map<String, Value>,
}

/// Picks the first usable value: the stored field if non-empty, then the
/// metadata claim, then empty.
fn layered(stored: Option<&String>, claim: Option<&str>) -> String {
    stored
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .or(claim)
        .unwrap_or_default()
        .to_string()
}

/// Merges a profile record over identity metadata into a [`Profile`].
///
/// The stored record wins field by field; identity metadata is the
/// fallback layer. The display name has one more fallback, the email
/// local-part, so a user always has something to be addressed by. A
/// missing record (`None`) produces the fully degraded profile; the
/// session is still authenticated.
#[must_use]
pub fn merge_profile(identity: &Identity, record: Option<&ProfileRecord>) -> Profile {
    let empty = ProfileRecord::default();
    let record = record.unwrap_or(&empty);

    let name = {
        let merged = layered(record.name.as_ref(), identity.metadata_str("name"));
        if merged.is_empty() {
            identity.email_local_part().unwrap_or_default().to_string()
        } else {
            merged
        }
    };

    let role_str = layered(record.role.as_ref(), identity.metadata_str("role"));
    let role = if role_str.is_empty() {
        Role::default()
    } else {
        Role::parse(&role_str)
    };

    Profile {
        name,
        phone: layered(record.phone.as_ref(), identity.metadata_str("phone")),
        role,
        location: layered(record.location.as_ref(), identity.metadata_str("location")),
        date_of_birth: layered(
            record.date_of_birth.as_ref(),
            identity.metadata_str("date_of_birth"),
        ),
        invite_code: layered(
            record.invite_code.as_ref(),
            identity.metadata_str("invite_code"),
        ),
        referred_by: layered(
            record.referred_by.as_ref(),
            identity.metadata_str("referred_by"),
        ),
        metadata: identity.metadata().clone(),
    }
}

/// Trait for the remote profile store.
///
/// A key-value record store keyed by the backend-issued user ID. The
/// abstraction allows testing enrichment without a backend.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetches the profile row for a user, `None` if no row exists yet.
    async fn profile_by_id(&self, id: &UserId) -> Result<Option<ProfileRecord>, ProfileError>;

    /// Creates or updates the profile row for a user, returning the
    /// stored row.
    async fn upsert_profile(
        &self,
        id: &UserId,
        record: &ProfileRecord,
    ) -> Result<ProfileRecord, ProfileError>;
}
