//! The remote identity boundary.
//!
//! An [`Identity`] is the opaque authenticated-principal handle returned
//! by the hosted auth service: the user's backend-issued ID, the email
//! the account was registered with, and the raw metadata claims attached
//! at signup. It is held in memory for the lifetime of a session and is
//! never persisted by this crate.

use crate::error::IdentityError;
use async_trait::async_trait;
use nestline_core::UserId;
use serde_json::{Map, Value};

/// The authenticated principal returned by the remote auth service.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Backend-issued user ID.
    id: UserId,
    /// Email the account was registered with, if known.
    email: Option<String>,
    /// Raw metadata claims attached to the account at signup.
    metadata: Map<String, Value>,
}

impl Identity {
    /// Creates an identity with the given backend-issued ID.
    #[must_use]
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            email: None,
            metadata: Map::new(),
        }
    }

    /// Sets the account email.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Sets the raw metadata claims.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the backend-issued user ID.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    /// Returns the account email, if known.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the part of the email before the `@`, if an email is set.
    ///
    /// Used as the last-resort display-name fallback during enrichment.
    #[must_use]
    pub fn email_local_part(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|part| !part.is_empty())
    }

    /// Returns the raw metadata claims.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Returns a metadata claim as a non-empty string, if present.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// An identity change pushed by the remote auth service.
///
/// The service notifies the client of sign-ins, token refreshes, and
/// sign-outs that happen outside an explicit login (another tab, token
/// rotation). These events feed `AuthStore::handle_auth_event` so every
/// trigger flows through the one state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A session was established.
    SignedIn(Identity),
    /// The session's token was refreshed; the identity may carry updated
    /// claims.
    TokenRefreshed(Identity),
    /// The session ended remotely.
    SignedOut,
}

/// Trait for the remote identity service.
///
/// This is the vendor-owned auth backend seen through its SDK. The
/// abstraction allows testing the auth flows without a backend.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Returns the current session's identity, or `None` if the service
    /// definitively reports no session.
    async fn current_session(&self) -> Result<Option<Identity>, IdentityError>;

    /// Exchanges credentials for an identity.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError>;

    /// Invalidates the remote session.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}
