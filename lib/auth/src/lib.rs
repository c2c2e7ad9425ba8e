//! Session resolution, credential login, and auth state for nestline.
//!
//! This crate is the control-flow layer between the app and the hosted
//! auth backend. It owns three flows:
//!
//! - **Session resolution**: at boot (and on each remote auth-state
//!   change), decide whether the user is authenticated by racing the
//!   backend's session check against escalating timeouts with bounded
//!   retries, then attach a best-effort profile.
//! - **Credential login**: exchange email and password for a session,
//!   distinguishing terminal rejections from retryable failures.
//! - **Logout**: invalidate the remote session and clear local state,
//!   with cleanup guaranteed even when the remote call fails.
//!
//! All three settle into one published [`AuthState`] through the
//! [`AuthStore`]; the UI subscribes to that single source of truth.
//!
//! Profile enrichment is strictly best-effort: a confirmed identity is
//! authenticated even when the profile store is down. The merge is pure
//! and layered. The stored profile wins; identity metadata is the
//! fallback:
//!
//! ```
//! use nestline_auth::{Identity, Role, merge_profile};
//! use nestline_core::UserId;
//!
//! let identity = Identity::new(UserId::from("u1"))
//!     .with_email(Some("jane@example.com".to_string()));
//!
//! // No profile row, no metadata: the name degrades to the email
//! // local-part and the role to the default.
//! let profile = merge_profile(&identity, None);
//! assert_eq!(profile.name, "jane");
//! assert_eq!(profile.role, Role::Surrogate);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod profile;
pub mod retry;
pub mod session;
pub mod store;

// Re-export main types at crate root
pub use cache::{CACHED_USER_KEY, CachedUser, CachedUserStore};
pub use config::AuthConfig;
pub use error::{IdentityError, LoginError, ProfileError};
pub use identity::{AuthEvent, Identity, IdentityService};
pub use profile::{Profile, ProfileRecord, ProfileStore, Role, merge_profile};
pub use retry::{AttemptFailure, RetryError, RetryPolicy, retry_with_timeout};
pub use session::{AuthState, Session};
pub use store::AuthStore;
