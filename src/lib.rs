//! Client-side session lifecycle against a cookie-backed auth authority.
//!
//! ARCHITECTURE
//! ============
//! - `net`: HTTP calls (`SessionClient`) behind the `SessionApi` trait.
//! - `state`: `AuthStore`, the single owner of `AuthState`.
//! - `services`: the background session poller.
//! - `util`: the access gate consumed by route guards.
//! - `config`: environment-driven settings.
//!
//! A store is built once per application shell and passed to whoever needs
//! it; there is no global instance.

pub mod config;
pub mod net;
pub mod services;
pub mod state;
pub mod util;

pub use config::AuthConfig;
pub use net::api::{SessionApi, SessionClient};
pub use net::types::{AuthError, CsrfToken, SessionCheck};
pub use services::poller::{SessionPoller, spawn_session_poller};
pub use state::auth::{AuthState, AuthStore, LoginStatus, PollOutcome};
pub use util::gate::{GateDecision, decide};
