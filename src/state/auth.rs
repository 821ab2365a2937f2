//! Auth-session state and the store that owns it.
//!
//! SYSTEM CONTEXT
//! ==============
//! Built once at application start and handed to every consumer. Route
//! guards read it through [`crate::util::gate`], the poller re-validates it
//! in the background, and the presentation layer calls `login`/`logout`.
//!
//! DESIGN
//! ======
//! State lives in a `watch` channel so readers always see a whole
//! `AuthState` and can await changes. Mutating operations hold an async
//! operation lock: initialization runs its steps in strict order, and a
//! login issued while initialization is pending queues behind it.
//!
//! A mutation epoch, bumped inside the same `send_modify` that applies a
//! login/logout/initialize/session resolution, lets poll verdicts that raced with a mutation be
//! discarded. A scope token cancels in-flight calls on `shutdown` so a slow
//! response never lands on a torn-down store.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::net::api::{SessionApi, SessionClient};
use crate::net::types::{AuthError, CsrfToken, SessionCheck};

pub const LOGIN_FALLBACK_MESSAGE: &str = "An error occurred.";
pub const LOGOUT_FALLBACK_MESSAGE: &str = "An error occurred during logout.";
pub const CSRF_FETCH_FAILED_MESSAGE: &str = "Failed to fetch CSRF token.";
pub const SESSION_CHECK_FAILED_MESSAGE: &str = "Failed to check session.";
pub const CURRENT_USER_FAILED_MESSAGE: &str = "Failed to fetch current user.";

// =============================================================================
// STATE
// =============================================================================

/// Login status as last resolved against the authority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoginStatus {
    /// Not yet known: before or during initialization.
    #[default]
    Pending,
    LoggedIn,
    LoggedOut,
}

impl LoginStatus {
    #[must_use]
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Authentication state tracking the current user and request status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    pub status: LoginStatus,
    /// Present only while `LoggedIn`. May be `None` while logged in when the
    /// current-user lookup failed.
    pub username: Option<String>,
    pub csrf_token: Option<CsrfToken>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    /// Tri-state view: `None` while pending.
    #[must_use]
    pub fn is_logged_in(&self) -> Option<bool> {
        match self.status {
            LoginStatus::Pending => None,
            LoginStatus::LoggedIn => Some(true),
            LoginStatus::LoggedOut => Some(false),
        }
    }

    fn mark_logged_in(&mut self, username: Option<String>) {
        self.status = LoginStatus::LoggedIn;
        self.username = username.filter(|u| !u.is_empty());
    }

    fn mark_logged_out(&mut self) {
        self.status = LoginStatus::LoggedOut;
        self.username = None;
    }
}

/// What a single poll tick did to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not logged in, either before the check was sent or by the time its
    /// verdict arrived.
    Skipped,
    /// The authority still reports the session as valid.
    Active,
    /// The authority ended the session; the store is now logged out.
    Ended,
    /// A login/logout happened while the check was in flight; verdict dropped.
    Stale,
    /// No verdict was obtained; state left untouched.
    Failed,
}

// =============================================================================
// STORE
// =============================================================================

struct StoreInner {
    api: Arc<dyn SessionApi>,
    state: watch::Sender<AuthState>,
    ops: Mutex<()>,
    epoch: AtomicU64,
    scope: CancellationToken,
}

/// Single owner of [`AuthState`]. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<StoreInner>,
}

/// Sets `loading` on creation and clears it on drop, including when the
/// owning future is dropped mid-flight.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<AuthState>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<AuthState>) -> Self {
        state.send_modify(|s| s.loading = true);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.loading = false);
    }
}

impl AuthStore {
    #[must_use]
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(StoreInner {
                api,
                state,
                ops: Mutex::new(()),
                epoch: AtomicU64::new(0),
                scope: CancellationToken::new(),
            }),
        }
    }

    /// Build a store backed by a real [`SessionClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        let client = SessionClient::new(config)?;
        Ok(Self::new(Arc::new(client)))
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Set or clear the user-visible error.
    pub fn set_error(&self, error: Option<String>) {
        self.inner.state.send_modify(|s| s.error = error);
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.scope.is_cancelled()
    }

    /// Tear down the store scope. Pending calls resolve to
    /// [`AuthError::Cancelled`] without touching state; later calls fail fast.
    pub fn shutdown(&self) {
        if !self.inner.scope.is_cancelled() {
            info!("auth store shutting down");
            self.inner.scope.cancel();
        }
    }

    /// Resolves once the store has been shut down.
    pub async fn closed(&self) {
        self.inner.scope.cancelled().await;
    }

    /// Wait until the login status leaves `Pending`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Cancelled`] if the store is shut down first.
    pub async fn wait_until_resolved(&self) -> Result<AuthState, AuthError> {
        let mut rx = self.subscribe();
        tokio::select! {
            () = self.inner.scope.cancelled() => Err(AuthError::Cancelled),
            resolved = rx.wait_for(|s| s.status.is_resolved()) => {
                resolved.map(|s| s.clone()).map_err(|_| AuthError::Cancelled)
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Run the startup sequence: CSRF token, session verdict, username.
    ///
    /// Never leaves `loading` set or the status `Pending`. Any failure is
    /// recorded in `error`; an unobtainable session verdict resolves to
    /// `LoggedOut`.
    pub async fn initialize(&self) -> AuthState {
        let _op = self.inner.ops.lock().await;
        let loading = LoadingGuard::begin(&self.inner.state);
        self.commit(|s| {
            s.status = LoginStatus::Pending;
            s.username = None;
            s.error = None;
        });

        match self.guarded(self.inner.api.fetch_csrf_token()).await {
            Ok(token) => self.inner.state.send_modify(|s| s.csrf_token = Some(token)),
            Err(e) => {
                warn!(error = %e, "csrf token fetch failed; mutations disabled");
                self.record_failure(&e, CSRF_FETCH_FAILED_MESSAGE);
            }
        }

        if let Err(e) = self.resolve_session().await {
            debug!(error = %e, "session resolved fail-closed");
        }
        // A cancelled check writes nothing, but initialization never ends pending.
        self.inner.state.send_if_modified(|s| {
            if s.status != LoginStatus::Pending {
                return false;
            }
            s.mark_logged_out();
            true
        });

        drop(loading);
        let state = self.snapshot();
        info!(status = ?state.status, username = ?state.username, "auth state initialized");
        state
    }

    /// Re-ask the authority for the session verdict on demand.
    ///
    /// Same fail-closed policy as initialization.
    ///
    /// # Errors
    ///
    /// The session check's error, after the store has been resolved to
    /// `LoggedOut`. A `Cancelled` check leaves the state as it was.
    pub async fn refresh_session(&self) -> Result<SessionCheck, AuthError> {
        let _op = self.inner.ops.lock().await;
        self.ensure_open()?;
        self.resolve_session().await
    }

    /// Steps 3–4 of initialization, shared with `refresh_session`.
    async fn resolve_session(&self) -> Result<SessionCheck, AuthError> {
        let check = match self.guarded(self.inner.api.check_session()).await {
            Ok(check) => check,
            Err(AuthError::Cancelled) => return Err(AuthError::Cancelled),
            Err(e) => {
                warn!(error = %e, "session check failed; treating as logged out");
                self.commit(AuthState::mark_logged_out);
                self.record_failure(&e, SESSION_CHECK_FAILED_MESSAGE);
                return Err(e);
            }
        };

        if !check.logged_in {
            self.commit(AuthState::mark_logged_out);
            return Ok(check);
        }

        let known = self.snapshot();
        if known.status == LoginStatus::LoggedIn && known.username.is_some() {
            return Ok(check);
        }

        let username = match self.guarded(self.inner.api.fetch_current_user()).await {
            Ok(name) => Some(name),
            Err(AuthError::Cancelled) => return Err(AuthError::Cancelled),
            Err(e) => {
                warn!(error = %e, "current user lookup failed; username unknown");
                self.record_failure(&e, CURRENT_USER_FAILED_MESSAGE);
                None
            }
        };
        self.commit(|s| s.mark_logged_in(username));
        Ok(check)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Log in with the cached CSRF token.
    ///
    /// On success the store is `LoggedIn` as `username` with no error. On
    /// failure the status is unchanged and `error` holds the server's message
    /// or a generic fallback.
    ///
    /// # Errors
    ///
    /// `MissingCsrfToken`/`MissingCredentials` before dispatch, `Rejected`,
    /// `Transport`, or `Cancelled`.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let _op = self.inner.ops.lock().await;
        self.ensure_open()?;
        let token = self.require_token(LOGIN_FALLBACK_MESSAGE)?;
        if username.trim().is_empty() || password.is_empty() {
            let err = AuthError::MissingCredentials;
            self.record_failure(&err, LOGIN_FALLBACK_MESSAGE);
            return Err(err);
        }

        let _loading = LoadingGuard::begin(&self.inner.state);
        match self.guarded(self.inner.api.login(&token, username, password)).await {
            Ok(()) => {
                self.commit(|s| {
                    s.mark_logged_in(Some(username.to_owned()));
                    s.error = None;
                });
                info!(%username, "login succeeded");
                Ok(())
            }
            Err(e) => {
                warn!(%username, error = %e, "login failed");
                self.record_failure(&e, LOGIN_FALLBACK_MESSAGE);
                Err(e)
            }
        }
    }

    /// Log out with the cached CSRF token.
    ///
    /// A failed logout records the error but leaves the local logged-in
    /// state alone; the poller re-resolves it.
    ///
    /// # Errors
    ///
    /// `MissingCsrfToken` before dispatch, `Rejected`, `Transport`, or
    /// `Cancelled`.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _op = self.inner.ops.lock().await;
        self.ensure_open()?;
        let token = self.require_token(LOGOUT_FALLBACK_MESSAGE)?;

        let _loading = LoadingGuard::begin(&self.inner.state);
        match self.guarded(self.inner.api.logout(&token)).await {
            Ok(()) => {
                self.commit(|s| {
                    s.mark_logged_out();
                    s.error = None;
                });
                info!("logout succeeded");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "logout failed; keeping local session state");
                self.record_failure(&e, LOGOUT_FALLBACK_MESSAGE);
                Err(e)
            }
        }
    }

    // =========================================================================
    // POLLING
    // =========================================================================

    /// One re-validation tick. Errors are logged, never surfaced in `error`.
    pub async fn poll_session(&self) -> PollOutcome {
        if self.snapshot().status != LoginStatus::LoggedIn {
            return PollOutcome::Skipped;
        }
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        match self.guarded(self.inner.api.check_session()).await {
            Ok(check) if check.logged_in => PollOutcome::Active,
            Ok(_) => {
                let mut stale = false;
                let ended = self.inner.state.send_if_modified(|s| {
                    if self.inner.epoch.load(Ordering::SeqCst) != epoch {
                        stale = true;
                        return false;
                    }
                    if s.status != LoginStatus::LoggedIn {
                        return false;
                    }
                    s.mark_logged_out();
                    s.error = None;
                    true
                });
                if stale {
                    debug!("discarding poll verdict that raced with a login/logout");
                    PollOutcome::Stale
                } else if ended {
                    info!("session ended by authority");
                    PollOutcome::Ended
                } else {
                    debug!("session already ended before poll verdict arrived");
                    PollOutcome::Skipped
                }
            }
            Err(e) => {
                warn!(error = %e, "session poll failed; keeping current state");
                PollOutcome::Failed
            }
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Apply a login-status mutation and bump the epoch in the same step.
    fn commit(&self, apply: impl FnOnce(&mut AuthState)) {
        self.inner.state.send_modify(|s| {
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            apply(s);
        });
    }

    fn ensure_open(&self) -> Result<(), AuthError> {
        if self.is_shut_down() { Err(AuthError::Cancelled) } else { Ok(()) }
    }

    fn require_token(&self, fallback: &str) -> Result<CsrfToken, AuthError> {
        let cached = self.inner.state.borrow().csrf_token.clone();
        if let Some(token) = cached {
            return Ok(token);
        }
        let err = AuthError::MissingCsrfToken;
        warn!("mutating call blocked: no CSRF token");
        self.record_failure(&err, fallback);
        Err(err)
    }

    fn record_failure(&self, err: &AuthError, fallback: &str) {
        if matches!(err, AuthError::Cancelled) {
            return;
        }
        let message = err.user_message(fallback);
        self.inner.state.send_modify(|s| s.error = Some(message));
    }

    async fn guarded<T>(&self, call: impl Future<Output = Result<T, AuthError>>) -> Result<T, AuthError> {
        tokio::select! {
            biased;
            () = self.inner.scope.cancelled() => Err(AuthError::Cancelled),
            result = call => result,
        }
    }
}
