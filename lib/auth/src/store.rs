//! The auth store: one state machine for every authentication trigger.
//!
//! Boot-time resolution, explicit login, logout, and remote auth-state
//! events all settle into the same published [`AuthState`]. UI surfaces
//! subscribe to the store instead of deriving "logged in" from scattered
//! sources, so there is exactly one answer at any time.
//!
//! Resolution is absorbing: it never surfaces an error, only a binary
//! authenticated/unauthenticated outcome. Login surfaces a discriminated
//! [`LoginError`] for the UI to display. Logout re-raises a remote
//! failure only after local state has been cleared.

use crate::cache::{CachedUser, CachedUserStore};
use crate::config::AuthConfig;
use crate::error::{IdentityError, LoginError, ProfileError};
use crate::identity::{AuthEvent, Identity, IdentityService};
use crate::profile::{ProfileRecord, ProfileStore, merge_profile};
use crate::retry::{RetryError, retry_with_timeout};
use crate::session::{AuthState, Session};
use nestline_storage::{DeviceStorage, DraftStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// The single source of truth for authentication state.
///
/// Generic over the three backend seams so the flows can be exercised
/// against scripted implementations.
pub struct AuthStore<I, P, S>
where
    I: IdentityService,
    P: ProfileStore,
    S: DeviceStorage,
{
    identity: I,
    profiles: P,
    cache: CachedUserStore<S>,
    drafts: DraftStore<S>,
    config: AuthConfig,
    state: watch::Sender<AuthState>,
}

impl<I, P, S> AuthStore<I, P, S>
where
    I: IdentityService,
    P: ProfileStore,
    S: DeviceStorage,
{
    /// Creates a store in the `Checking` state.
    #[must_use]
    pub fn new(identity: I, profiles: P, storage: Arc<S>, config: AuthConfig) -> Self {
        let (state, _) = watch::channel(AuthState::Checking);
        Self {
            identity,
            profiles,
            cache: CachedUserStore::new(Arc::clone(&storage)),
            drafts: DraftStore::new(storage),
            config,
            state,
        }
    }

    /// Subscribes to auth state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Returns a snapshot of the current auth state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Resolves whether a user is authenticated. Run once per boot and
    /// once per remote auth-state change.
    ///
    /// Always settles in `Authenticated` or `Unauthenticated`; every
    /// wait inside is timer-bounded. Repeated resolution with a stable
    /// backend produces the same session: each run rebuilds it from
    /// scratch through the pure merge.
    pub async fn resolve_session(&self) -> AuthState {
        self.set_state(AuthState::Checking);

        // Every session-check error is retried identically; the backend
        // gives us no terminal classification for this call.
        let outcome = retry_with_timeout(&self.config.session_check, |_| false, || {
            self.identity.current_session()
        })
        .await;

        match outcome {
            Ok(Some(identity)) => {
                tracing::info!(user_id = %identity.id(), "live session confirmed");
                let session = self
                    .enrich(identity, self.config.resolve_profile_timeout())
                    .await;
                self.remember(&session).await;
                let state = AuthState::Authenticated(session);
                self.set_state(state.clone());
                state
            }
            Ok(None) => {
                tracing::info!("backend reports no session");
                self.distrust_cache().await;
                self.set_state(AuthState::Unauthenticated);
                AuthState::Unauthenticated
            }
            Err(err) => {
                tracing::warn!(error = %err, "session check failed, treating as unauthenticated");
                self.distrust_cache().await;
                self.set_state(AuthState::Unauthenticated);
                AuthState::Unauthenticated
            }
        }
    }

    /// [`resolve_session`](Self::resolve_session) under the configured
    /// outer ceiling.
    ///
    /// The resolver's own budget (three escalating attempts plus
    /// backoffs) can exceed 80 seconds; callers that paint a loading
    /// screen use this wrapper to force a pessimistic answer at the
    /// ceiling instead.
    pub async fn resolve_session_bounded(&self) -> AuthState {
        let ceiling = self.config.resolve_ceiling();
        match time::timeout(ceiling, self.resolve_session()).await {
            Ok(state) => state,
            Err(_elapsed) => {
                tracing::warn!(
                    ceiling_ms = self.config.resolve_ceiling_ms,
                    "resolution exceeded the outer ceiling, forcing unauthenticated"
                );
                self.set_state(AuthState::Unauthenticated);
                AuthState::Unauthenticated
            }
        }
    }

    /// Exchanges credentials for a session.
    ///
    /// Credential rejections, unconfirmed emails, and explicit
    /// unauthorized responses fail immediately; everything else is
    /// retried up to the configured cap. On success the session is
    /// enriched, mirrored to device storage, and published.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, LoginError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let outcome = retry_with_timeout(&self.config.login, IdentityError::is_terminal, || {
            self.identity.sign_in_with_password(email, password)
        })
        .await;

        let identity = match outcome {
            Ok(identity) => identity,
            Err(RetryError::Terminal(err)) => {
                tracing::info!(error = %err, "login rejected");
                return Err(terminal_login_error(err));
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::warn!(
                    attempts,
                    failure = %last,
                    "credential exchange exhausted its retry budget"
                );
                return Err(LoginError::AttemptsExhausted { attempts });
            }
        };

        tracing::info!(user_id = %identity.id(), "login succeeded");
        let session = self
            .enrich(identity, self.config.login_profile_timeout())
            .await;
        self.remember(&session).await;
        self.set_state(AuthState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Invalidates the remote session and clears local state.
    ///
    /// Local cleanup runs whether or not the remote call succeeds; a
    /// remote failure is returned only after the cached user, the
    /// current user's draft, and the in-memory session are gone.
    pub async fn logout(&self) -> Result<(), IdentityError> {
        let user_id = self.state.borrow().session().map(|s| s.user_id().clone());

        let remote = self.identity.sign_out().await;

        self.set_state(AuthState::Unauthenticated);
        if let Err(e) = self.cache.clear().await {
            tracing::warn!(error = %e, "failed to delete cached user during logout");
        }
        if let Some(user_id) = user_id {
            if let Err(e) = self.drafts.clear(&user_id).await {
                tracing::warn!(error = %e, "failed to delete draft during logout");
            }
        }

        if let Err(e) = &remote {
            tracing::warn!(error = %e, "remote sign-out failed, local state already cleared");
        }
        remote
    }

    /// Feeds a pushed identity change into the state machine.
    ///
    /// The remote service's change listener calls this instead of
    /// mutating UI state directly, so sign-ins from another surface and
    /// token refreshes land in the same place as explicit login. When a
    /// login and a pushed event race, last writer wins.
    pub async fn handle_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(identity) | AuthEvent::TokenRefreshed(identity) => {
                tracing::debug!(user_id = %identity.id(), "auth event: session established");
                let session = self
                    .enrich(identity, self.config.resolve_profile_timeout())
                    .await;
                self.remember(&session).await;
                self.set_state(AuthState::Authenticated(session));
            }
            AuthEvent::SignedOut => {
                tracing::debug!("auth event: signed out remotely");
                if let Err(e) = self.cache.clear().await {
                    tracing::warn!(error = %e, "failed to delete cached user after remote sign-out");
                }
                self.set_state(AuthState::Unauthenticated);
            }
        }
    }

    /// Writes profile fields for the authenticated user and refreshes
    /// the session from the stored row.
    ///
    /// Unlike enrichment this is an explicit write path, so failures
    /// are surfaced rather than degraded.
    pub async fn update_profile(&self, record: ProfileRecord) -> Result<Session, ProfileError> {
        let identity = {
            let state = self.state.borrow();
            match state.session() {
                Some(session) => session.identity().clone(),
                None => return Err(ProfileError::NotAuthenticated),
            }
        };

        let budget = self.config.login_profile_timeout();
        let upsert = self.profiles.upsert_profile(identity.id(), &record);
        let stored = match time::timeout(budget, upsert).await {
            Ok(Ok(stored)) => stored,
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => return Err(ProfileError::TimedOut),
        };

        let profile = merge_profile(&identity, Some(&stored));
        let session = Session::new(identity, profile);
        self.remember(&session).await;
        self.set_state(AuthState::Authenticated(session.clone()));
        Ok(session)
    }

    /// Attaches the best-available profile to a confirmed identity.
    ///
    /// Identity presence alone is sufficient for authentication: a
    /// missing row, a store error, or a blown budget all degrade to the
    /// metadata-derived profile and never fail the session.
    async fn enrich(&self, identity: Identity, budget: Duration) -> Session {
        let fetch = self.profiles.profile_by_id(identity.id());
        let record = match time::timeout(budget, fetch).await {
            Ok(Ok(Some(record))) => Some(record),
            Ok(Ok(None)) => {
                tracing::debug!(user_id = %identity.id(), "no profile record yet");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "profile fetch failed, enriching from identity metadata");
                None
            }
            Err(_elapsed) => {
                tracing::warn!("profile fetch timed out, enriching from identity metadata");
                None
            }
        };
        let profile = merge_profile(&identity, record.as_ref());
        Session::new(identity, profile)
    }

    /// Mirrors a session to device storage. Storage failures are logged,
    /// never propagated: the mirror is a hint, not part of the contract.
    async fn remember(&self, session: &Session) {
        let cached = CachedUser::from_session(session);
        if let Err(e) = self.cache.save(&cached).await {
            tracing::warn!(error = %e, "failed to persist cached user");
        }
    }

    /// Deletes the cached-user mirror. A mirror without a confirmed
    /// remote session is evidence, not authentication, and keeping it
    /// would let a stale identity outlive its remote session.
    async fn distrust_cache(&self) {
        match self.cache.load().await {
            Ok(Some(cached)) => {
                tracing::warn!(
                    user_id = %cached.user_id,
                    "discarding cached user without a live session"
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read cached user"),
        }
        if let Err(e) = self.cache.clear().await {
            tracing::warn!(error = %e, "failed to delete cached user");
        }
    }

    fn set_state(&self, next: AuthState) {
        self.state.send_replace(next);
    }
}

/// Maps a terminal identity-service error to its login-level form.
fn terminal_login_error(err: IdentityError) -> LoginError {
    match err {
        IdentityError::InvalidCredentials => LoginError::InvalidCredentials,
        IdentityError::EmailNotConfirmed { message } => LoginError::EmailNotConfirmed { message },
        IdentityError::Unauthorized { message } => LoginError::Unauthorized { message },
        // `is_terminal` admits only the variants above; a retryable
        // error landing here is a classification bug.
        other => {
            tracing::error!(error = %other, "retryable error classified as terminal");
            LoginError::AttemptsExhausted { attempts: 1 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHED_USER_KEY;
    use async_trait::async_trait;
    use nestline_core::UserId;
    use nestline_storage::MemoryStorage;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// One scripted answer to `current_session`.
    #[derive(Debug, Clone)]
    enum SessionStep {
        Found(Identity),
        Missing,
        Fail(IdentityError),
        Hang,
    }

    /// One scripted answer to `sign_in_with_password`.
    #[derive(Debug, Clone)]
    enum SignInStep {
        Succeed(Identity),
        Fail(IdentityError),
        Hang,
    }

    /// Identity service that replays scripted responses and counts calls.
    struct ScriptedIdentity {
        sessions: Mutex<VecDeque<SessionStep>>,
        sign_ins: Mutex<VecDeque<SignInStep>>,
        sign_out_error: Option<IdentityError>,
        session_calls: Arc<AtomicU32>,
        sign_in_calls: Arc<AtomicU32>,
    }

    impl ScriptedIdentity {
        fn new() -> Self {
            Self {
                sessions: Mutex::new(VecDeque::new()),
                sign_ins: Mutex::new(VecDeque::new()),
                sign_out_error: None,
                session_calls: Arc::new(AtomicU32::new(0)),
                sign_in_calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn with_sessions(steps: Vec<SessionStep>) -> Self {
            let service = Self::new();
            *service.sessions.lock().unwrap() = steps.into();
            service
        }

        fn with_sign_ins(steps: Vec<SignInStep>) -> Self {
            let service = Self::new();
            *service.sign_ins.lock().unwrap() = steps.into();
            service
        }

        fn failing_sign_out(mut self, error: IdentityError) -> Self {
            self.sign_out_error = Some(error);
            self
        }

        fn session_call_counter(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.session_calls)
        }

        fn sign_in_call_counter(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.sign_in_calls)
        }
    }

    #[async_trait]
    impl IdentityService for ScriptedIdentity {
        async fn current_session(&self) -> Result<Option<Identity>, IdentityError> {
            self.session_calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .sessions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SessionStep::Missing);
            match step {
                SessionStep::Found(identity) => Ok(Some(identity)),
                SessionStep::Missing => Ok(None),
                SessionStep::Fail(e) => Err(e),
                SessionStep::Hang => std::future::pending().await,
            }
        }

        async fn sign_in_with_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<Identity, IdentityError> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .sign_ins
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SignInStep::Fail(IdentityError::MalformedResponse));
            match step {
                SignInStep::Succeed(identity) => Ok(identity),
                SignInStep::Fail(e) => Err(e),
                SignInStep::Hang => std::future::pending().await,
            }
        }

        async fn sign_out(&self) -> Result<(), IdentityError> {
            match &self.sign_out_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    /// One scripted answer to `profile_by_id`.
    #[derive(Debug, Clone)]
    enum ProfileStep {
        Found(ProfileRecord),
        Missing,
        Fail(ProfileError),
        Hang,
    }

    /// Profile store that replays scripted fetches and records upserts.
    struct ScriptedProfiles {
        steps: Mutex<VecDeque<ProfileStep>>,
        upserts: Mutex<Vec<(UserId, ProfileRecord)>>,
    }

    impl ScriptedProfiles {
        fn new() -> Self {
            Self {
                steps: Mutex::new(VecDeque::new()),
                upserts: Mutex::new(Vec::new()),
            }
        }

        fn with_steps(steps: Vec<ProfileStep>) -> Self {
            let store = Self::new();
            *store.steps.lock().unwrap() = steps.into();
            store
        }

        fn upsert_count(&self) -> usize {
            self.upserts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProfileStore for ScriptedProfiles {
        async fn profile_by_id(
            &self,
            _id: &UserId,
        ) -> Result<Option<ProfileRecord>, ProfileError> {
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ProfileStep::Missing);
            match step {
                ProfileStep::Found(record) => Ok(Some(record)),
                ProfileStep::Missing => Ok(None),
                ProfileStep::Fail(e) => Err(e),
                ProfileStep::Hang => std::future::pending().await,
            }
        }

        async fn upsert_profile(
            &self,
            id: &UserId,
            record: &ProfileRecord,
        ) -> Result<ProfileRecord, ProfileError> {
            self.upserts
                .lock()
                .unwrap()
                .push((id.clone(), record.clone()));
            Ok(record.clone())
        }
    }

    fn jane() -> Identity {
        Identity::new(UserId::from("user-jane"))
            .with_email(Some("jane@example.com".to_string()))
    }

    fn jane_record() -> ProfileRecord {
        ProfileRecord {
            name: Some("Jane Doe".to_string()),
            phone: Some("555-0100".to_string()),
            role: Some("surrogate".to_string()),
            ..ProfileRecord::default()
        }
    }

    fn store_with(
        identity: ScriptedIdentity,
        profiles: ScriptedProfiles,
        storage: Arc<MemoryStorage>,
    ) -> AuthStore<ScriptedIdentity, ScriptedProfiles, MemoryStorage> {
        AuthStore::new(identity, profiles, storage, AuthConfig::default())
    }

    #[tokio::test]
    async fn resolving_twice_with_stable_backend_yields_identical_sessions() {
        let identity = ScriptedIdentity::with_sessions(vec![
            SessionStep::Found(jane()),
            SessionStep::Found(jane()),
        ]);
        let profiles = ScriptedProfiles::with_steps(vec![
            ProfileStep::Found(jane_record()),
            ProfileStep::Found(jane_record()),
        ]);
        let store = store_with(identity, profiles, Arc::new(MemoryStorage::new()));

        let first = store.resolve_session().await;
        let second = store.resolve_session().await;

        assert!(first.is_authenticated());
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn session_check_timeouts_escalate_then_give_up() {
        let identity = ScriptedIdentity::with_sessions(vec![SessionStep::Hang; 3]);
        let calls = identity.session_call_counter();
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let start = Instant::now();
        let state = store.resolve_session().await;

        assert_eq!(state, AuthState::Unauthenticated);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 15s + 3s pause + 25s + 3s pause + 35s; no fourth attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(81));
    }

    #[tokio::test]
    async fn stale_cached_user_is_deleted_when_backend_reports_no_session() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(CACHED_USER_KEY, &json!({"anything": "at all"}).to_string())
            .await
            .unwrap();
        let identity = ScriptedIdentity::with_sessions(vec![SessionStep::Missing]);
        let store = store_with(identity, ScriptedProfiles::new(), Arc::clone(&storage));

        let state = store.resolve_session().await;

        assert_eq!(state, AuthState::Unauthenticated);
        assert_eq!(storage.get_item(CACHED_USER_KEY).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_session_check_also_discards_cached_user() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(CACHED_USER_KEY, "{}").await.unwrap();
        let identity = ScriptedIdentity::with_sessions(vec![
            SessionStep::Fail(IdentityError::Network {
                message: "unreachable".to_string(),
            });
            3
        ]);
        let store = store_with(identity, ScriptedProfiles::new(), Arc::clone(&storage));

        let state = store.resolve_session().await;

        assert_eq!(state, AuthState::Unauthenticated);
        assert_eq!(storage.get_item(CACHED_USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_profile_record_degrades_to_email_local_part() {
        let storage = Arc::new(MemoryStorage::new());
        let identity = ScriptedIdentity::with_sessions(vec![SessionStep::Found(jane())]);
        let profiles = ScriptedProfiles::with_steps(vec![ProfileStep::Missing]);
        let store = store_with(identity, profiles, Arc::clone(&storage));

        let state = store.resolve_session().await;

        let session = state.session().expect("should be authenticated");
        assert_eq!(session.profile().name, "jane");
        // The degraded session is still mirrored.
        assert!(storage.get_item(CACHED_USER_KEY).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn profile_fetch_timeout_does_not_block_authentication() {
        let identity = ScriptedIdentity::with_sessions(vec![SessionStep::Found(jane())]);
        let profiles = ScriptedProfiles::with_steps(vec![ProfileStep::Hang]);
        let store = store_with(identity, profiles, Arc::new(MemoryStorage::new()));

        let start = Instant::now();
        let state = store.resolve_session().await;

        assert!(state.is_authenticated());
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn profile_store_error_degrades_instead_of_failing() {
        let identity = ScriptedIdentity::with_sessions(vec![SessionStep::Found(jane())]);
        let profiles = ScriptedProfiles::with_steps(vec![ProfileStep::Fail(
            ProfileError::Store {
                message: "row level security".to_string(),
            },
        )]);
        let store = store_with(identity, profiles, Arc::new(MemoryStorage::new()));

        let state = store.resolve_session().await;

        assert!(state.is_authenticated());
        assert_eq!(
            state.session().expect("authenticated").profile().name,
            "jane"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_is_bounded_by_the_outer_ceiling() {
        let identity = ScriptedIdentity::with_sessions(vec![SessionStep::Hang; 3]);
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let start = Instant::now();
        let state = store.resolve_session_bounded().await;

        assert_eq!(state, AuthState::Unauthenticated);
        assert_eq!(store.state(), AuthState::Unauthenticated);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn login_with_empty_credentials_never_calls_the_service() {
        let identity = ScriptedIdentity::new();
        let calls = identity.sign_in_call_counter();
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        assert_eq!(
            store.login("", "secret").await,
            Err(LoginError::MissingCredentials)
        );
        assert_eq!(
            store.login("jane@example.com", "").await,
            Err(LoginError::MissingCredentials)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_credentials_fail_without_retry() {
        let identity = ScriptedIdentity::with_sign_ins(vec![SignInStep::Fail(
            IdentityError::InvalidCredentials,
        )]);
        let calls = identity.sign_in_call_counter();
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let result = store.login("jane@example.com", "wrong").await;

        assert_eq!(result, Err(LoginError::InvalidCredentials));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.unwrap_err().user_message(),
            "Invalid email or password"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retry_to_exhaustion_with_pauses() {
        let identity = ScriptedIdentity::with_sign_ins(vec![
            SignInStep::Fail(IdentityError::Service {
                message: "500".to_string(),
            });
            3
        ]);
        let calls = identity.sign_in_call_counter();
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let start = Instant::now();
        let result = store.login("jane@example.com", "secret").await;

        assert_eq!(result, Err(LoginError::AttemptsExhausted { attempts: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two 2s error backoffs between the three attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_identity_payload_is_retried() {
        let identity = ScriptedIdentity::with_sign_ins(vec![
            SignInStep::Fail(IdentityError::MalformedResponse),
            SignInStep::Succeed(jane()),
        ]);
        let calls = identity.sign_in_call_counter();
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let result = store.login("jane@example.com", "secret").await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_credential_exchange_times_out_per_attempt() {
        let identity = ScriptedIdentity::with_sign_ins(vec![SignInStep::Hang; 3]);
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let start = Instant::now();
        let result = store.login("jane@example.com", "secret").await;

        assert_eq!(result, Err(LoginError::AttemptsExhausted { attempts: 3 }));
        // Three 60s attempts with two 3s timeout backoffs.
        assert_eq!(start.elapsed(), Duration::from_secs(186));
    }

    #[tokio::test]
    async fn successful_login_persists_cached_user_and_publishes_state() {
        let storage = Arc::new(MemoryStorage::new());
        let identity = ScriptedIdentity::with_sign_ins(vec![SignInStep::Succeed(jane())]);
        let profiles = ScriptedProfiles::with_steps(vec![ProfileStep::Found(jane_record())]);
        let store = store_with(identity, profiles, Arc::clone(&storage));
        let mut watcher = store.subscribe();

        let session = store
            .login("jane@example.com", "secret")
            .await
            .expect("login should succeed");

        assert_eq!(session.profile().name, "Jane Doe");
        assert_eq!(store.state(), AuthState::Authenticated(session.clone()));
        assert!(storage.get_item(CACHED_USER_KEY).await.unwrap().is_some());
        // Subscribers observe the new state.
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_local_state_before_returning_remote_error() {
        let storage = Arc::new(MemoryStorage::new());
        let identity = ScriptedIdentity::with_sign_ins(vec![SignInStep::Succeed(jane())])
            .failing_sign_out(IdentityError::Service {
                message: "sign-out failed".to_string(),
            });
        let store = store_with(identity, ScriptedProfiles::new(), Arc::clone(&storage));

        store
            .login("jane@example.com", "secret")
            .await
            .expect("login should succeed");
        let drafts = DraftStore::new(Arc::clone(&storage));
        drafts
            .save(&UserId::from("user-jane"), &json!({"step": 3}))
            .await
            .unwrap();

        let result = store.logout().await;

        // The error is re-raised, but only after local state is gone.
        assert_eq!(
            result,
            Err(IdentityError::Service {
                message: "sign-out failed".to_string()
            })
        );
        assert_eq!(store.state(), AuthState::Unauthenticated);
        assert_eq!(storage.get_item(CACHED_USER_KEY).await.unwrap(), None);
        assert_eq!(storage.get_item("draft_user-jane").await.unwrap(), None);
    }

    #[tokio::test]
    async fn logout_succeeds_when_remote_sign_out_succeeds() {
        let identity = ScriptedIdentity::with_sign_ins(vec![SignInStep::Succeed(jane())]);
        let store = store_with(
            identity,
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );
        store
            .login("jane@example.com", "secret")
            .await
            .expect("login should succeed");

        assert_eq!(store.logout().await, Ok(()));
        assert_eq!(store.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn auth_events_flow_through_the_same_state_machine() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(
            ScriptedIdentity::new(),
            ScriptedProfiles::with_steps(vec![ProfileStep::Found(jane_record())]),
            Arc::clone(&storage),
        );

        store.handle_auth_event(AuthEvent::SignedIn(jane())).await;
        assert!(store.state().is_authenticated());
        assert!(storage.get_item(CACHED_USER_KEY).await.unwrap().is_some());

        store.handle_auth_event(AuthEvent::SignedOut).await;
        assert_eq!(store.state(), AuthState::Unauthenticated);
        assert_eq!(storage.get_item(CACHED_USER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_profile_requires_authentication() {
        let store = store_with(
            ScriptedIdentity::new(),
            ScriptedProfiles::new(),
            Arc::new(MemoryStorage::new()),
        );

        let result = store.update_profile(jane_record()).await;

        assert_eq!(result, Err(ProfileError::NotAuthenticated));
    }

    #[tokio::test]
    async fn update_profile_upserts_and_refreshes_the_session() {
        let identity = ScriptedIdentity::with_sign_ins(vec![SignInStep::Succeed(jane())]);
        let profiles = ScriptedProfiles::new();
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(identity, profiles, Arc::clone(&storage));
        store
            .login("jane@example.com", "secret")
            .await
            .expect("login should succeed");

        let update = ProfileRecord {
            name: Some("Jane D.".to_string()),
            location: Some("Portland".to_string()),
            ..ProfileRecord::default()
        };
        let session = store
            .update_profile(update)
            .await
            .expect("update should succeed");

        assert_eq!(session.profile().name, "Jane D.");
        assert_eq!(session.profile().location, "Portland");
        assert_eq!(store.state(), AuthState::Authenticated(session));
        assert_eq!(store.profiles.upsert_count(), 1);
    }
}
