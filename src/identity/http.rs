//! HTTP identity service — thin client for the hosted auth REST surface.
//!
//! DESIGN
//! ======
//! Wraps three provider endpoints (`/auth/v1/otp`, `/auth/v1/user`,
//! `/auth/v1/logout`) behind [`IdentityService`]. The provider does the
//! actual work — link issuance, email delivery, code exchange, token
//! signing — so this client is request plumbing plus a current-session
//! slot and a change-event broadcast. Response parsing is kept in pure
//! helpers for testability.

use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::ProviderConfig;
use crate::identity::{AuthEvent, AuthEventKind, Identity, IdentityService, ProviderError, Session};

/// Buffered change events per subscriber before lag kicks in.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpIdentityService {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    /// Most recent session accepted or fetched. Provider-owned truth; this
    /// is only the local cache `get_session` validates against `/user`.
    current: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl HttpIdentityService {
    /// Build a client from provider config.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::HttpClientBuild`] if the HTTP client cannot
    /// be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
            current: Mutex::new(None),
            events,
        })
    }

    /// Install a session obtained out of band (the redirect page completes
    /// the code exchange provider-side) and announce the sign-in.
    pub fn accept_session(&self, session: Session) {
        {
            let mut current = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *current = Some(session.clone());
        }
        self.emit(AuthEventKind::SignedIn, Some(session));
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        // Send only fails with zero receivers, which is fine: nobody is
        // watching yet.
        let _ = self.events.send(AuthEvent { kind, session });
    }

    fn cached_session(&self) -> Option<Session> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl IdentityService for HttpIdentityService {
    async fn get_session(&self) -> Option<Session> {
        let session = self.cached_session()?;

        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "session probe failed; treating as signed out");
                return None;
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "session probe body read failed; treating as signed out");
                return None;
            }
        };

        if status != 200 {
            tracing::warn!(status, "session probe rejected; clearing cached session");
            let mut current = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *current = None;
            return None;
        }

        match parse_user(&body) {
            Ok(user) => {
                let refreshed = Session { user, access_token: session.access_token };
                let mut current = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                *current = Some(refreshed.clone());
                Some(refreshed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session probe parse failed; treating as signed out");
                None
            }
        }
    }

    async fn sign_in_with_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(otp_url(&self.base_url, redirect_to))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(|e| ProviderError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::ApiRequest(e.to_string()))?;

        if status != 200 {
            return Err(provider_error(status, &body));
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        let Some(session) = self.cached_session() else {
            // Already signed out; nothing to revoke.
            return Ok(());
        };

        let response = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 && status != 204 {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status, &body));
        }

        {
            let mut current = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *current = None;
        }
        self.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// WIRE TYPES & PURE HELPERS
// =============================================================================

#[derive(Deserialize)]
struct UserPayload {
    id: uuid::Uuid,
    email: String,
    last_sign_in_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

/// Parse a `/auth/v1/user` response body into an [`Identity`].
fn parse_user(body: &str) -> Result<Identity, ProviderError> {
    let payload: UserPayload = serde_json::from_str(body).map_err(|e| ProviderError::ApiParse(e.to_string()))?;
    Ok(Identity {
        id: payload.id,
        email: payload.email,
        last_sign_in_at: payload.last_sign_in_at,
    })
}

/// Map a non-success provider response to [`ProviderError::ApiResponse`],
/// extracting the human-readable message when the body carries one.
pub(crate) fn provider_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|p| p.msg.or(p.message).or(p.error_description))
        .unwrap_or_default();
    ProviderError::ApiResponse { status, message }
}

/// Build the OTP endpoint URL with the redirect target encoded as a query
/// parameter.
fn otp_url(base_url: &str, redirect_to: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect_to", redirect_to)
        .finish();
    format!("{base_url}/auth/v1/otp?{query}")
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
