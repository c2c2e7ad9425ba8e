//! Error types for the auth crate.
//!
//! The taxonomy follows the propagation policy of the auth flows:
//! - `IdentityError`: what the remote identity service can report.
//!   Carries the terminal/retryable classification used by the retry
//!   combinator.
//! - `LoginError`: what an explicit login surfaces to the UI, including
//!   the normalized user-facing message.
//! - `ProfileError`: failures of the explicit profile-update path.
//!   Enrichment failures during resolution/login are never surfaced.

use std::fmt;

/// Errors reported by the remote identity service.
///
/// The first three variants are terminal: retrying cannot change the
/// outcome and they short-circuit the retry budget. Everything else is
/// retryable up to the attempt cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The credentials were rejected.
    InvalidCredentials,
    /// The account's email address has not been confirmed yet.
    EmailNotConfirmed { message: String },
    /// The service returned an explicit unauthorized status.
    Unauthorized { message: String },
    /// The service could not be reached.
    Network { message: String },
    /// The service answered with an error (5xx-style failures).
    Service { message: String },
    /// The service answered success but the identity payload was missing
    /// or unparsable. Treated as retryable.
    MalformedResponse,
}

impl IdentityError {
    /// Returns true if retrying this error cannot change the outcome.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::EmailNotConfirmed { .. } | Self::Unauthorized { .. }
        )
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid login credentials"),
            Self::EmailNotConfirmed { message } => {
                write!(f, "email not confirmed: {message}")
            }
            Self::Unauthorized { message } => write!(f, "unauthorized: {message}"),
            Self::Network { message } => write!(f, "network error: {message}"),
            Self::Service { message } => write!(f, "identity service error: {message}"),
            Self::MalformedResponse => {
                write!(f, "identity service returned a malformed response")
            }
        }
    }
}

impl std::error::Error for IdentityError {}

/// Errors surfaced by an explicit login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Email or password was empty. Checked before any remote call.
    MissingCredentials,
    /// The credentials were rejected.
    InvalidCredentials,
    /// The account's email address has not been confirmed yet.
    EmailNotConfirmed { message: String },
    /// The service returned an explicit unauthorized status.
    Unauthorized { message: String },
    /// Every attempt failed with a retryable error or timeout.
    AttemptsExhausted { attempts: u32 },
}

impl LoginError {
    /// The message shown to the user.
    ///
    /// Credential rejections are normalized to a single message; the
    /// other terminal failures pass the service's message through
    /// verbatim.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCredentials => "Email and password are required.".to_string(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::EmailNotConfirmed { message } | Self::Unauthorized { message } => {
                message.clone()
            }
            Self::AttemptsExhausted { attempts } => {
                format!("Login failed after {attempts} attempts. Please try again.")
            }
        }
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "email and password are required"),
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::EmailNotConfirmed { message } => {
                write!(f, "email not confirmed: {message}")
            }
            Self::Unauthorized { message } => write!(f, "unauthorized: {message}"),
            Self::AttemptsExhausted { attempts } => {
                write!(f, "login failed after {attempts} attempts")
            }
        }
    }
}

impl std::error::Error for LoginError {}

/// Errors from the explicit profile-update path.
///
/// Best-effort enrichment never produces these; only
/// `AuthStore::update_profile` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No authenticated session to update a profile for.
    NotAuthenticated,
    /// The profile store rejected the operation.
    Store { message: String },
    /// The profile store did not answer within the budget.
    TimedOut,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "no authenticated session"),
            Self::Store { message } => write!(f, "profile store error: {message}"),
            Self::TimedOut => write!(f, "profile store request timed out"),
        }
    }
}

impl std::error::Error for ProfileError {}
