//! Demo binary: request a magic link for an email address, then tail the
//! session state as the provider reports changes.

use std::sync::Arc;
use std::time::Duration;

use airestate::{HttpIdentityService, IdentityService, MagicLinkFlow, ProviderConfig, SessionStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let email = std::env::args().nth(1).expect("usage: airestate <email>");
    let config = ProviderConfig::from_env().expect("provider config incomplete");

    let service: Arc<dyn IdentityService> =
        Arc::new(HttpIdentityService::new(&config).expect("HTTP client init failed"));
    let store = SessionStore::new(Arc::clone(&service));
    store.initialize().await;

    let mut subscription = store.subscribe();
    tracing::info!(signed_in = subscription.current().signed_in(), "session initialized");

    let flow = MagicLinkFlow::new(service, config.redirect_target.clone())
        .with_timeout(Duration::from_secs(config.request_timeout_secs));
    flow.set_email(&email);
    let state = flow.request_link().await;
    tracing::info!(
        phase = ?state.phase,
        message = state.status_message.as_deref().unwrap_or(""),
        "magic link request finished"
    );

    // Tail auth changes until interrupted (the provider emits them once the
    // link is opened and the session is accepted).
    while let Some(state) = subscription.changed().await {
        tracing::info!(signed_in = state.signed_in(), "session changed");
    }
}
