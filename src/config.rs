//! Session-authority configuration parsed from environment variables.

use std::time::Duration;

use crate::net::types::AuthError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Origin of the session authority, without trailing slash.
    pub base_url: String,
    pub poll_interval: Duration,
    pub timeouts: HttpTimeouts,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl AuthConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `AUTH_BASE_URL`: default `http://localhost:5000`
    /// - `AUTH_POLL_INTERVAL_MS`: default 3000
    /// - `AUTH_REQUEST_TIMEOUT_SECS`: default 10
    /// - `AUTH_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigParse`] for a malformed base URL or a
    /// zero poll interval.
    pub fn from_env() -> Result<Self, AuthError> {
        let base_url = match std::env::var("AUTH_BASE_URL") {
            Ok(raw) => parse_base_url(&raw)?,
            Err(_) => DEFAULT_BASE_URL.to_owned(),
        };
        let poll_ms = env_parse("AUTH_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS);
        if poll_ms == 0 {
            return Err(AuthError::ConfigParse("AUTH_POLL_INTERVAL_MS must be greater than zero".into()));
        }
        let timeouts = HttpTimeouts {
            request_secs: env_parse("AUTH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, poll_interval: Duration::from_millis(poll_ms), timeouts })
    }

    /// Replace the base URL, validating it the same way `from_env` does.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ConfigParse`] if the URL is not http(s).
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, AuthError> {
        self.base_url = parse_base_url(raw)?;
        Ok(self)
    }

    /// Join an API path (e.g. `/api/login`) onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<String, AuthError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match host {
        Some(rest) if !rest.is_empty() => Ok(trimmed.to_owned()),
        _ => Err(AuthError::ConfigParse(format!("invalid AUTH_BASE_URL: {raw}"))),
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(v) => v.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
