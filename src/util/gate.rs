//! Access gate for protected views.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route components ask the gate what to render; the gate only reads the
//! store's state and never touches the network. An unresolved status holds
//! the view on a pending indicator, it is never treated as either answer.

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;

use crate::net::types::AuthError;
use crate::state::auth::{AuthState, AuthStore, LoginStatus};

/// Where unauthenticated visitors are sent.
pub const UNAUTHENTICATED_ENTRY: &str = "/";

/// What a protected view should do for the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Status unknown: show a pending indicator and nothing else.
    Pending,
    /// Render the protected content.
    Admit,
    /// Navigate to the unauthenticated entry point.
    Redirect { to: &'static str },
}

impl GateDecision {
    #[must_use]
    pub fn admits(self) -> bool {
        matches!(self, Self::Admit)
    }
}

#[must_use]
pub fn decide(state: &AuthState) -> GateDecision {
    match state.status {
        LoginStatus::Pending => GateDecision::Pending,
        LoginStatus::LoggedIn => GateDecision::Admit,
        LoginStatus::LoggedOut => GateDecision::Redirect { to: UNAUTHENTICATED_ENTRY },
    }
}

/// Wait for the store to resolve, then decide. For guards that can afford
/// to block instead of rendering the pending state themselves.
///
/// # Errors
///
/// [`AuthError::Cancelled`] if the store shuts down while pending.
pub async fn decide_when_resolved(store: &AuthStore) -> Result<GateDecision, AuthError> {
    let state = store.wait_until_resolved().await?;
    Ok(decide(&state))
}
