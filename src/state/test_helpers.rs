//! Scriptable in-process `SessionApi` for store and poller tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::net::api::SessionApi;
use crate::net::types::{AuthError, CsrfToken, SessionCheck};
use crate::state::auth::AuthStore;

/// One recorded call against the fake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CsrfToken,
    CheckSession,
    CurrentUser,
    Login { token: String, username: String },
    Logout { token: String },
}

pub struct FakeSessionApi {
    csrf: Mutex<Result<String, AuthError>>,
    session: Mutex<Result<bool, AuthError>>,
    user: Mutex<Result<String, AuthError>>,
    login: Mutex<Result<(), AuthError>>,
    logout: Mutex<Result<(), AuthError>>,
    mutation_delay: Mutex<Duration>,
    check_delay: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeSessionApi {
    /// Token `"abc"`, session logged out, every mutation succeeds.
    #[must_use]
    pub fn logged_out() -> Arc<Self> {
        Arc::new(Self {
            csrf: Mutex::new(Ok("abc".to_owned())),
            session: Mutex::new(Ok(false)),
            user: Mutex::new(Err(AuthError::Rejected { status: 401, message: None })),
            login: Mutex::new(Ok(())),
            logout: Mutex::new(Ok(())),
            mutation_delay: Mutex::new(Duration::ZERO),
            check_delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Like [`Self::logged_out`] but the cookie session already belongs to `username`.
    #[must_use]
    pub fn logged_in_as(username: &str) -> Arc<Self> {
        let api = Self::logged_out();
        api.set_session(Ok(true));
        api.set_user(Ok(username.to_owned()));
        api
    }

    pub fn set_csrf(&self, result: Result<String, AuthError>) {
        *lock(&self.csrf) = result;
    }

    pub fn set_session(&self, result: Result<bool, AuthError>) {
        *lock(&self.session) = result;
    }

    pub fn set_user(&self, result: Result<String, AuthError>) {
        *lock(&self.user) = result;
    }

    pub fn set_login(&self, result: Result<(), AuthError>) {
        *lock(&self.login) = result;
    }

    pub fn set_logout(&self, result: Result<(), AuthError>) {
        *lock(&self.logout) = result;
    }

    /// Make login/logout take this long before answering.
    pub fn set_mutation_delay(&self, delay: Duration) {
        *lock(&self.mutation_delay) = delay;
    }

    /// Make the session check take this long; the verdict is read afterwards.
    pub fn set_check_delay(&self, delay: Duration) {
        *lock(&self.check_delay) = delay;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }

    fn delay(&self) -> Duration {
        *lock(&self.mutation_delay)
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl SessionApi for FakeSessionApi {
    async fn fetch_csrf_token(&self) -> Result<CsrfToken, AuthError> {
        self.record(Call::CsrfToken);
        let raw = lock(&self.csrf).clone()?;
        CsrfToken::new(raw).ok_or_else(|| AuthError::Decode("empty csrf_token".into()))
    }

    async fn check_session(&self) -> Result<SessionCheck, AuthError> {
        self.record(Call::CheckSession);
        let delay = *lock(&self.check_delay);
        Self::pause(delay).await;
        let logged_in = lock(&self.session).clone()?;
        Ok(SessionCheck { logged_in })
    }

    async fn fetch_current_user(&self) -> Result<String, AuthError> {
        self.record(Call::CurrentUser);
        lock(&self.user).clone()
    }

    async fn login(&self, token: &CsrfToken, username: &str, _password: &str) -> Result<(), AuthError> {
        self.record(Call::Login { token: token.as_str().to_owned(), username: username.to_owned() });
        Self::pause(self.delay()).await;
        lock(&self.login).clone()
    }

    async fn logout(&self, token: &CsrfToken) -> Result<(), AuthError> {
        self.record(Call::Logout { token: token.as_str().to_owned() });
        Self::pause(self.delay()).await;
        lock(&self.logout).clone()
    }
}

/// Store wired to `api`.
#[must_use]
pub fn store_with(api: &Arc<FakeSessionApi>) -> AuthStore {
    AuthStore::new(Arc::clone(api) as Arc<dyn SessionApi>)
}
