//! Session observer — one consistent view of "who is signed in".
//!
//! ARCHITECTURE
//! ============
//! [`SessionStore`] is the single writer of [`SessionState`]. It issues one
//! initial session query against the identity service and thereafter
//! applies provider change events, fanning the resulting states out to any
//! number of [`SessionSubscription`]s over a broadcast channel. Consumers
//! get read-only snapshots plus the ordered change stream; nothing else
//! mutates the state.
//!
//! The store is constructed explicitly and injected where needed — no
//! process-wide singleton — so tests run isolated instances. The upstream
//! change listener is scoped to consumer interest: the first subscription
//! registers exactly one listener with the identity service, dropping the
//! last subscription releases it, and a later subscription re-registers.
//!
//! TRADE-OFFS
//! ==========
//! Change events are applied only while the pump task runs, i.e. while at
//! least one subscription is alive. An unobserved store keeps its last
//! snapshot; that is the cost of not leaking the upstream registration.

use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::identity::{AuthEvent, Identity, IdentityService, ProviderError};

/// Buffered state transitions per subscriber before lag kicks in.
const STATE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// STATE
// =============================================================================

/// Snapshot of the authentication state.
///
/// `is_loading` is `true` only until the initial session query completes;
/// it never flips back, regardless of later sign-ins or sign-outs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub is_loading: bool,
}

impl SessionState {
    fn pending() -> Self {
        Self { identity: None, is_loading: true }
    }

    /// True while a signed-in identity is present.
    #[must_use]
    pub fn signed_in(&self) -> bool {
        self.identity.is_some()
    }
}

// =============================================================================
// STORE
// =============================================================================

struct Pump {
    subscribers: usize,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    service: Arc<dyn IdentityService>,
    state: Mutex<SessionState>,
    tx: broadcast::Sender<SessionState>,
    pump: Mutex<Pump>,
    init: OnceCell<()>,
}

/// Reactive store tracking the current authenticated identity.
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store backed by `service`. State starts pending
    /// (`identity: None, is_loading: true`) until [`initialize`] runs.
    ///
    /// [`initialize`]: SessionStore::initialize
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        let (tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                service,
                state: Mutex::new(SessionState::pending()),
                tx,
                pump: Mutex::new(Pump { subscribers: 0, handle: None }),
                init: OnceCell::new(),
            }),
        }
    }

    /// Run the initial session query. Idempotent: concurrent and repeated
    /// calls issue exactly one `get_session` against the provider.
    ///
    /// On completion `is_loading` is `false` unconditionally; a query
    /// failure is indistinguishable from "no session" and never surfaces
    /// to the caller.
    pub async fn initialize(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner
            .init
            .get_or_init(|| async move {
                let session = inner.service.get_session().await;
                let mut state = lock(&inner.state);
                state.identity = session.map(|s| s.user);
                state.is_loading = false;
                // Send under the state lock so broadcast order matches
                // state order.
                let _ = inner.tx.send(state.clone());
            })
            .await;
    }

    /// Register a consumer. The returned subscription starts from the
    /// current snapshot and then yields every subsequent state in order.
    ///
    /// The first live subscription registers the single upstream change
    /// listener; dropping the last one releases it.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        let mut pump = lock(&self.inner.pump);
        pump.subscribers += 1;
        if pump.handle.is_none() {
            // Register with the provider here, not inside the task: an
            // event emitted the instant this method returns must already
            // have a live receiver buffering it.
            let events = self.inner.service.subscribe();
            pump.handle = Some(spawn_pump(Arc::clone(&self.inner), events));
        }
        drop(pump);

        // Attach atomically: every writer sends under this same state
        // lock, so nothing lands between the fan-out registration and the
        // snapshot. The receiver holds only states newer than the
        // snapshot; a consumer never observes an older state after a
        // newer one.
        let state = lock(&self.inner.state);
        let rx = self.inner.tx.subscribe();
        let current = state.clone();
        drop(state);
        SessionSubscription { inner: Arc::clone(&self.inner), rx, current }
    }

    /// Read-only snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> SessionState {
        lock(&self.inner.state).clone()
    }

    /// End the current session via the identity service. Store state is
    /// not touched here; it changes when the resulting `SignedOut` event
    /// arrives on the change stream (single-writer rule).
    ///
    /// # Errors
    ///
    /// Returns the provider rejection if the sign-out call fails.
    pub async fn sign_out(&self) -> Result<(), ProviderError> {
        self.inner.service.sign_out().await
    }
}

impl Drop for SessionStore {
    /// Dispose: stop applying upstream events. Outstanding subscriptions
    /// keep their last-seen snapshots but receive no further changes.
    fn drop(&mut self) {
        let mut pump = lock(&self.inner.pump);
        if let Some(handle) = pump.handle.take() {
            handle.abort();
        }
    }
}

fn spawn_pump(inner: Arc<Inner>, mut events: broadcast::Receiver<AuthEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => apply_event(&inner, &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth event stream lagged; resuming at newest");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Apply one provider change event. Updates `identity` only: `is_loading`
/// settles with the initial query and never flips back.
fn apply_event(inner: &Inner, event: &AuthEvent) {
    let mut state = lock(&inner.state);
    state.identity = event.session.clone().map(|s| s.user);
    tracing::debug!(kind = ?event.kind, signed_in = state.signed_in(), "auth state change");
    let _ = inner.tx.send(state.clone());
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// A consumer's handle on the session state: a snapshot plus the ordered
/// stream of subsequent states. Dropping it detaches the consumer; the
/// last drop releases the upstream change listener.
pub struct SessionSubscription {
    inner: Arc<Inner>,
    rx: broadcast::Receiver<SessionState>,
    current: SessionState,
}

impl SessionSubscription {
    /// Most recent state seen by this subscription.
    #[must_use]
    pub fn current(&self) -> &SessionState {
        &self.current
    }

    /// Wait for the next state. Returns `None` if the state stream has
    /// closed. A subscriber that falls behind skips to the oldest retained
    /// state — it can miss intermediates but never observes an older state
    /// after a newer one.
    pub async fn changed(&mut self) -> Option<SessionState> {
        loop {
            match self.rx.recv().await {
                Ok(state) => {
                    self.current = state.clone();
                    return Some(state);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session subscriber lagged; resuming at oldest retained");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        let mut pump = lock(&self.inner.pump);
        pump.subscribers = pump.subscribers.saturating_sub(1);
        if pump.subscribers == 0 {
            if let Some(handle) = pump.handle.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
