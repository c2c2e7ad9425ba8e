//! Auth flow configuration.
//!
//! Every timeout, backoff, and attempt cap used by the auth flows lives
//! here, with the production values as serde defaults so an embedding
//! app can load the whole struct from its configuration source and
//! override only what it needs.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for session resolution, login, and enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Retry policy for the boot-time session check. Timeouts escalate
    /// 15s, 25s, 35s across the three attempts.
    #[serde(default = "default_session_check")]
    pub session_check: RetryPolicy,

    /// Retry policy for the credential exchange. A long fixed 60s
    /// timeout per attempt.
    #[serde(default = "default_login")]
    pub login: RetryPolicy,

    /// Budget for profile enrichment during session resolution, in
    /// milliseconds. Kept short: boot must not wait on the profile
    /// store.
    #[serde(default = "default_resolve_profile_timeout_ms")]
    pub resolve_profile_timeout_ms: u64,

    /// Budget for profile enrichment after an explicit login, in
    /// milliseconds.
    #[serde(default = "default_login_profile_timeout_ms")]
    pub login_profile_timeout_ms: u64,

    /// Outer ceiling for `resolve_session_bounded`, in milliseconds.
    /// When it elapses before the resolver settles, the outcome is
    /// forced to unauthenticated.
    #[serde(default = "default_resolve_ceiling_ms")]
    pub resolve_ceiling_ms: u64,
}

fn default_session_check() -> RetryPolicy {
    RetryPolicy::new(15_000).with_timeout_increment(10_000)
}

fn default_login() -> RetryPolicy {
    RetryPolicy::new(60_000)
}

fn default_resolve_profile_timeout_ms() -> u64 {
    5000
}

fn default_login_profile_timeout_ms() -> u64 {
    30_000
}

fn default_resolve_ceiling_ms() -> u64 {
    30_000
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_check: default_session_check(),
            login: default_login(),
            resolve_profile_timeout_ms: default_resolve_profile_timeout_ms(),
            login_profile_timeout_ms: default_login_profile_timeout_ms(),
            resolve_ceiling_ms: default_resolve_ceiling_ms(),
        }
    }
}

impl AuthConfig {
    /// Returns the resolver enrichment budget as a duration.
    #[must_use]
    pub fn resolve_profile_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_profile_timeout_ms)
    }

    /// Returns the post-login enrichment budget as a duration.
    #[must_use]
    pub fn login_profile_timeout(&self) -> Duration {
        Duration::from_millis(self.login_profile_timeout_ms)
    }

    /// Returns the outer resolution ceiling as a duration.
    #[must_use]
    pub fn resolve_ceiling(&self) -> Duration {
        Duration::from_millis(self.resolve_ceiling_ms)
    }
}
