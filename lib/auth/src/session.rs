//! Sessions and the published auth state.
//!
//! A session is process-lifetime only: created when resolution or login
//! succeeds, destroyed on logout or irrecoverable resolution failure.
//! Durable state lives in the cached-user mirror, never here.

use crate::identity::Identity;
use crate::profile::Profile;
use nestline_core::UserId;

/// An authenticated user's in-memory session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The remote identity this session was resolved from.
    identity: Identity,
    /// Best-effort enrichment. Always present; degraded to
    /// metadata-derived fields when the profile store was unavailable.
    profile: Profile,
}

impl Session {
    /// Creates a session from an identity and its merged profile.
    #[must_use]
    pub fn new(identity: Identity, profile: Profile) -> Self {
        Self { identity, profile }
    }

    /// Returns the remote identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the merged profile.
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Returns the backend-issued user ID.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        self.identity.id()
    }

    /// Returns the account email, if known.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.identity.email()
    }
}

/// The authentication state published to the UI.
///
/// There is exactly one source of truth for "logged in": resolution,
/// login, logout, and remote auth events all settle into this enum
/// through the auth store.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// Resolution is in flight. The initial state at boot.
    #[default]
    Checking,
    /// A live remote identity was confirmed.
    Authenticated(Session),
    /// No session: never logged in, logged out, or resolution gave up.
    Unauthenticated,
}

impl AuthState {
    /// Returns true if a session is established.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns the session, if authenticated.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Checking | Self::Unauthenticated => None,
        }
    }
}
