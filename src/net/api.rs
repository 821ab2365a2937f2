//! REST calls against the session authority.
//!
//! ARCHITECTURE
//! ============
//! `SessionClient` is a thin `reqwest` wrapper with a cookie jar: the session
//! lives in a server cookie, so every request shares one jar. The store only
//! sees the `SessionApi` trait, which keeps it testable without a network.
//!
//! ERROR HANDLING
//! ==============
//! "Not logged in" is a normal `SessionCheck`, never an error. No response at
//! all is `Transport`; a non-2xx answer is `Rejected` carrying the server's
//! `msg` when it sent one. Preconditions (token, credentials) are checked
//! before anything is dispatched.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    AuthError, CsrfToken, CsrfTokenResponse, CurrentUserResponse, LoginRequest, SessionCheck, parse_error_message,
};
use crate::config::AuthConfig;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

pub(crate) const CSRF_TOKEN_PATH: &str = "/api/get_csrf_token";
pub(crate) const CHECK_SESSION_PATH: &str = "/api/check_logged_in";
pub(crate) const CURRENT_USER_PATH: &str = "/api/get_user";
pub(crate) const LOGIN_PATH: &str = "/api/login";
pub(crate) const LOGOUT_PATH: &str = "/api/logout";

// =============================================================================
// TRAIT
// =============================================================================

/// The five calls the store needs from the session authority.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// Obtain an anti-forgery token for later mutating calls.
    ///
    /// # Errors
    ///
    /// Transport failure, non-2xx status, or an empty/malformed token.
    async fn fetch_csrf_token(&self) -> Result<CsrfToken, AuthError>;

    /// Ask the authority whether the cookie session is logged in.
    ///
    /// # Errors
    ///
    /// Only when no usable verdict was obtained. Logged-out is `Ok`.
    async fn check_session(&self) -> Result<SessionCheck, AuthError>;

    /// Username of the logged-in session.
    ///
    /// # Errors
    ///
    /// Transport failure, non-2xx status, or malformed body.
    async fn fetch_current_user(&self) -> Result<String, AuthError>;

    /// Submit credentials with the CSRF header.
    ///
    /// # Errors
    ///
    /// `MissingCredentials` before dispatch, otherwise `Rejected`/`Transport`.
    async fn login(&self, token: &CsrfToken, username: &str, password: &str) -> Result<(), AuthError>;

    /// End the cookie session.
    ///
    /// # Errors
    ///
    /// `Rejected` or `Transport`.
    async fn logout(&self, token: &CsrfToken) -> Result<(), AuthError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SessionClient {
    http: reqwest::Client,
    config: AuthConfig,
}

impl SessionClient {
    /// Build a client with its own cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HttpClientBuild`] if `reqwest` rejects the settings.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let response = self
            .http
            .get(self.config.endpoint(path))
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let (status, text) = read_body(response).await?;
        debug!(path, status = status.as_u16(), "auth GET completed");
        if !status.is_success() {
            return Err(rejected(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn post_with_token(
        &self,
        path: &str,
        token: &CsrfToken,
        body: &(impl serde::Serialize + Sync),
    ) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.config.endpoint(path))
            .header(CSRF_HEADER, token.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let (status, text) = read_body(response).await?;
        debug!(path, status = status.as_u16(), "auth POST completed");
        if !status.is_success() {
            return Err(rejected(status, &text));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionApi for SessionClient {
    async fn fetch_csrf_token(&self) -> Result<CsrfToken, AuthError> {
        let body: CsrfTokenResponse = self.get_json(CSRF_TOKEN_PATH).await?;
        CsrfToken::new(body.csrf_token).ok_or_else(|| AuthError::Decode("empty csrf_token".into()))
    }

    async fn check_session(&self) -> Result<SessionCheck, AuthError> {
        self.get_json(CHECK_SESSION_PATH).await
    }

    async fn fetch_current_user(&self) -> Result<String, AuthError> {
        let body: CurrentUserResponse = self.get_json(CURRENT_USER_PATH).await?;
        if body.username.is_empty() {
            return Err(AuthError::Decode("empty username".into()));
        }
        Ok(body.username)
    }

    async fn login(&self, token: &CsrfToken, username: &str, password: &str) -> Result<(), AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        self.post_with_token(LOGIN_PATH, token, &LoginRequest { username, password })
            .await
    }

    async fn logout(&self, token: &CsrfToken) -> Result<(), AuthError> {
        self.post_with_token(LOGOUT_PATH, token, &serde_json::json!({}))
            .await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String), AuthError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;
    Ok((status, text))
}

fn rejected(status: StatusCode, body: &str) -> AuthError {
    AuthError::Rejected { status: status.as_u16(), message: parse_error_message(body) }
}
