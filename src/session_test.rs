use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::*;
use crate::identity::AuthEventKind;
use crate::identity::test_doubles::{MockIdentityService, dummy_session};

/// Yield until `predicate` holds; panics after too many scheduler turns.
async fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached: {what}");
}

// =============================================================================
// INITIALIZATION (P1)
// =============================================================================

#[tokio::test]
async fn state_is_pending_before_initialize() {
    let store = SessionStore::new(Arc::new(MockIdentityService::new()));
    let state = store.current();
    assert!(state.identity.is_none());
    assert!(state.is_loading);
}

#[tokio::test]
async fn initialize_resolves_existing_session() {
    let session = dummy_session("a@b.com");
    let store = SessionStore::new(Arc::new(MockIdentityService::with_session(session.clone())));

    let mut sub = store.subscribe();
    assert!(sub.current().is_loading);

    store.initialize().await;
    let state = sub.changed().await.unwrap();
    assert!(!state.is_loading);
    assert_eq!(state.identity, Some(session.user));
}

#[tokio::test]
async fn initialize_without_session_settles_signed_out() {
    let store = SessionStore::new(Arc::new(MockIdentityService::new()));
    store.initialize().await;

    let state = store.current();
    assert!(state.identity.is_none());
    assert!(!state.is_loading, "absence of a session still settles the loading flag");
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);

    store.initialize().await;
    store.initialize().await;
    assert_eq!(mock.get_session_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_initialize_issues_one_query() {
    let mock = Arc::new(MockIdentityService::new());
    let store = Arc::new(SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>));

    let a = Arc::clone(&store);
    let b = Arc::clone(&store);
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.initialize().await }),
        tokio::spawn(async move { b.initialize().await }),
    );
    ra.unwrap();
    rb.unwrap();
    assert_eq!(mock.get_session_calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// CHANGE FAN-OUT (P2)
// =============================================================================

#[tokio::test]
async fn events_fan_out_in_order_to_all_subscribers() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    store.initialize().await;

    let mut sub_a = store.subscribe();
    let mut sub_b = store.subscribe();
    wait_until("upstream listener registered", || mock.listener_count() == 1).await;

    let first = dummy_session("first@example.com");
    let refreshed = dummy_session("refreshed@example.com");
    mock.emit(AuthEventKind::SignedIn, Some(first.clone()));
    mock.emit(AuthEventKind::TokenRefreshed, Some(refreshed.clone()));
    mock.emit(AuthEventKind::SignedOut, None);

    for sub in [&mut sub_a, &mut sub_b] {
        let s1 = sub.changed().await.unwrap();
        assert_eq!(s1.identity, Some(first.user.clone()));
        let s2 = sub.changed().await.unwrap();
        assert_eq!(s2.identity, Some(refreshed.user.clone()));
        let s3 = sub.changed().await.unwrap();
        assert!(s3.identity.is_none());
        assert!(!s3.is_loading);
    }
}

#[tokio::test]
async fn change_events_never_unsettle_loading_flag() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    store.initialize().await;

    let mut sub = store.subscribe();
    wait_until("upstream listener registered", || mock.listener_count() == 1).await;

    mock.emit(AuthEventKind::SignedIn, Some(dummy_session("a@b.com")));
    let state = sub.changed().await.unwrap();
    assert!(state.identity.is_some());
    assert!(!state.is_loading);
}

#[tokio::test]
async fn lagged_subscriber_never_goes_backward() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    store.initialize().await;

    let mut sub = store.subscribe();
    wait_until("upstream listener registered", || mock.listener_count() == 1).await;

    // Overflow the per-subscriber buffer without draining.
    let total: usize = 200;
    for i in 0..total {
        mock.emit(AuthEventKind::SignedIn, Some(dummy_session(&format!("user{i}@example.com"))));
    }
    let last = format!("user{}@example.com", total - 1);
    wait_until("pump applied all events", || {
        store.current().identity.is_some_and(|id| id.email == last)
    })
    .await;

    let mut previous: Option<usize> = None;
    loop {
        let state = sub.changed().await.unwrap();
        let email = state.identity.unwrap().email;
        let index: usize = email
            .trim_start_matches("user")
            .trim_end_matches("@example.com")
            .parse()
            .unwrap();
        if let Some(prev) = previous {
            assert!(index > prev, "observed state {index} after newer state {prev}");
        }
        previous = Some(index);
        if index == total - 1 {
            break;
        }
    }
}

#[tokio::test]
async fn event_emitted_immediately_after_subscribe_is_applied() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    store.initialize().await;

    // No yield between subscribe and emit: the upstream registration must
    // already be live when subscribe() returns, not when the pump task
    // first runs.
    let mut sub = store.subscribe();
    let session = dummy_session("a@b.com");
    mock.emit(AuthEventKind::SignedIn, Some(session.clone()));

    let state = sub.changed().await.unwrap();
    assert_eq!(state.identity, Some(session.user));
    assert!(store.current().signed_in());
}

#[tokio::test]
async fn late_subscriber_starts_at_latest_state_and_never_replays_older() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    store.initialize().await;

    let warmup = store.subscribe();
    wait_until("upstream listener registered", || mock.listener_count() == 1).await;
    for i in 0..5 {
        mock.emit(AuthEventKind::SignedIn, Some(dummy_session(&format!("user{i}@example.com"))));
    }
    wait_until("pump applied all events", || {
        store.current().identity.is_some_and(|id| id.email == "user4@example.com")
    })
    .await;

    // Attaching is atomic: the snapshot is the latest state and none of
    // the five earlier states sit queued behind it.
    let mut sub = store.subscribe();
    assert_eq!(sub.current().identity.as_ref().unwrap().email, "user4@example.com");

    let next = dummy_session("next@example.com");
    mock.emit(AuthEventKind::SignedIn, Some(next.clone()));
    let state = sub.changed().await.unwrap();
    assert_eq!(state.identity, Some(next.user), "first delivery is newer than the snapshot");
    drop(warmup);
}

// =============================================================================
// LISTENER LIFECYCLE
// =============================================================================

#[tokio::test]
async fn upstream_listener_is_shared_and_scoped_to_interest() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    assert_eq!(mock.listener_count(), 0, "no listener before first subscriber");

    let sub_a = store.subscribe();
    let sub_b = store.subscribe();
    wait_until("single shared listener", || mock.listener_count() == 1).await;

    drop(sub_a);
    tokio::task::yield_now().await;
    assert_eq!(mock.listener_count(), 1, "listener survives while a subscriber remains");

    drop(sub_b);
    wait_until("listener released with last subscriber", || mock.listener_count() == 0).await;

    let _sub_c = store.subscribe();
    wait_until("listener re-registered on renewed interest", || mock.listener_count() == 1).await;
}

#[tokio::test]
async fn dropping_store_stops_the_pump() {
    let mock = Arc::new(MockIdentityService::new());
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    let _sub = store.subscribe();
    wait_until("upstream listener registered", || mock.listener_count() == 1).await;

    drop(store);
    wait_until("pump released on dispose", || mock.listener_count() == 0).await;
}

// =============================================================================
// SIGN-OUT (Scenario C)
// =============================================================================

#[tokio::test]
async fn sign_out_propagates_to_mounted_subscribers() {
    let session = dummy_session("a@b.com");
    let mock = Arc::new(MockIdentityService::with_session(session));
    let store = SessionStore::new(Arc::clone(&mock) as Arc<dyn IdentityService>);
    store.initialize().await;
    assert!(store.current().signed_in());

    let mut sub = store.subscribe();
    wait_until("upstream listener registered", || mock.listener_count() == 1).await;

    store.sign_out().await.unwrap();
    let state = sub.changed().await.unwrap();
    assert!(state.identity.is_none());
    assert!(!state.is_loading);
    assert!(!store.current().signed_in());
}
