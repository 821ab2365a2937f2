//! Wire schema and error taxonomy for the session authority.
//!
//! DESIGN
//! ======
//! Response bodies are deserialized into small private-field structs so the
//! rest of the crate never touches raw JSON. `AuthError` is shared by the
//! HTTP client and the store; the store turns it into the user-facing
//! `error` string via [`AuthError::user_message`].

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by session client and store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No response was received (connect failure, timeout, reset).
    #[error("request failed: {0}")]
    Transport(String),

    /// The authority answered with a non-success status.
    #[error("request rejected: status {status}")]
    Rejected { status: u16, message: Option<String> },

    /// A success response carried a body we could not use.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// A mutating call was attempted before a CSRF token was obtained.
    #[error("CSRF token not available")]
    MissingCsrfToken,

    /// Login was attempted with an empty username or password.
    #[error("username and password are required")]
    MissingCredentials,

    /// The owning store was shut down while the operation was pending.
    #[error("auth store shut down")]
    Cancelled,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),
}

pub const CSRF_UNAVAILABLE_MESSAGE: &str = "CSRF token not available.";
pub const MISSING_CREDENTIALS_MESSAGE: &str = "Username and password are required.";

impl AuthError {
    /// Text suitable for the store's `error` field.
    ///
    /// Server-supplied messages are surfaced verbatim; preconditions get
    /// their own fixed text; everything else falls back to `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected { message: Some(msg), .. } if !msg.trim().is_empty() => msg.clone(),
            Self::MissingCsrfToken => CSRF_UNAVAILABLE_MESSAGE.to_owned(),
            Self::MissingCredentials => MISSING_CREDENTIALS_MESSAGE.to_owned(),
            _ => fallback.to_owned(),
        }
    }

    /// True when the request never reached a decision from the authority.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

// =============================================================================
// CSRF TOKEN
// =============================================================================

/// Anti-forgery token echoed back on every mutating request.
///
/// Never empty. `Debug` is redacted so tokens don't leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wrap a raw token, rejecting empty or whitespace-only values.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() { None } else { Some(Self(raw)) }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(***)")
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// The authority's verdict on the current cookie session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionCheck {
    pub logged_in: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CsrfTokenResponse {
    pub(crate) csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentUserResponse {
    pub(crate) username: String,
}

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
}

/// Failure body shape used by the authority: `{ "msg": "..." }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) msg: Option<String>,
}

/// Pull the `msg` field out of a failure body, if there is one.
pub(crate) fn parse_error_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.msg.filter(|m| !m.trim().is_empty()),
        Err(_) => None,
    }
}
