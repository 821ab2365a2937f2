//! Session poller: background re-validation while logged in.
//!
//! DESIGN
//! ======
//! A supervisor task follows the store's `watch` channel. On the edge into
//! `LoggedIn` it arms an interval and calls `AuthStore::poll_session` on
//! every tick; on the edge out of `LoggedIn` (poll verdict, manual logout,
//! re-initialization) it disarms and goes back to waiting. This is how a
//! session expired or revoked server-side becomes visible without a reload.
//!
//! ERROR HANDLING
//! ==============
//! Poll failures are logged by the store and never reach the user-visible
//! error. Dropping the [`SessionPoller`] handle cancels the task, and so
//! does shutting the store down: a torn down owner cannot leak a recurring
//! background call.

#[cfg(test)]
#[path = "poller_test.rs"]
mod poller_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::auth::{AuthState, AuthStore, LoginStatus, PollOutcome};

/// Handle to a running poller. Dropping it stops the task.
pub struct SessionPoller {
    cancel: CancellationToken,
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionPoller {
    /// Whether the ticking loop is currently armed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Request cancellation without waiting. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "session poller task failed");
                }
            }
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for SessionPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Spawn the session poller for `store`, ticking every `interval` while
/// the store is logged in.
#[must_use]
pub fn spawn_session_poller(store: AuthStore, interval: Duration) -> SessionPoller {
    let cancel = CancellationToken::new();
    let active = Arc::new(AtomicBool::new(false));
    info!(?interval, "session poller configured");

    let handle = tokio::spawn(supervise(store, interval, cancel.clone(), Arc::clone(&active)));
    SessionPoller { cancel, active, handle: Some(handle) }
}

async fn supervise(store: AuthStore, interval: Duration, cancel: CancellationToken, active: Arc<AtomicBool>) {
    let mut rx = store.subscribe();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = store.closed() => break,
            armed = rx.wait_for(|s| s.status == LoginStatus::LoggedIn) => {
                if armed.is_err() {
                    break;
                }
            }
        }

        active.store(true, Ordering::SeqCst);
        debug!("session poller armed");
        run_ticks(&store, &mut rx, interval, &cancel).await;
        active.store(false, Ordering::SeqCst);
        debug!("session poller disarmed");

        if cancel.is_cancelled() || store.is_shut_down() {
            break;
        }
    }
    active.store(false, Ordering::SeqCst);
    debug!("session poller stopped");
}

/// Tick until the store leaves `LoggedIn`, the store shuts down, or the
/// poller is cancelled.
async fn run_ticks(
    store: &AuthStore,
    rx: &mut watch::Receiver<AuthState>,
    interval: Duration,
    cancel: &CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = store.closed() => return,
            changed = rx.changed() => {
                if changed.is_err() || rx.borrow_and_update().status != LoginStatus::LoggedIn {
                    return;
                }
            }
            _ = ticker.tick() => {
                let outcome = tokio::select! {
                    () = cancel.cancelled() => return,
                    outcome = store.poll_session() => outcome,
                };
                match outcome {
                    PollOutcome::Ended | PollOutcome::Skipped => return,
                    PollOutcome::Active | PollOutcome::Stale | PollOutcome::Failed => {}
                }
            }
        }
    }
}
