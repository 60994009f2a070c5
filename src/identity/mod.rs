//! Identity-service contract — domain types, errors, and the service trait.
//!
//! ARCHITECTURE
//! ============
//! The hosted identity provider owns every session: it issues tokens,
//! validates magic links, and decides when a session ends. This module
//! defines the read-only view of that world the rest of the crate consumes
//! ([`Identity`], [`Session`], [`AuthEvent`]) and the [`IdentityService`]
//! trait that seams the provider off for tests. The HTTP implementation
//! lives in [`http`].

pub mod http;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity-provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request could not be sent or completed.
    #[error("provider request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("provider response error: status {status}: {message}")]
    ApiResponse { status: u16, message: String },

    /// The provider response body could not be deserialized.
    #[error("provider response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ProviderError {
    /// Human-readable message supplied by the provider, when one exists.
    ///
    /// Transport and parse failures carry diagnostic text that is not fit
    /// for end users; only rejection messages pass through.
    #[must_use]
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            Self::ApiResponse { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

// =============================================================================
// DOMAIN TYPES
// =============================================================================

/// Signed-in principal as reported by the provider. Read-only cached copy;
/// the provider owns and mutates the underlying record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-unique user identifier.
    pub id: Uuid,
    /// Email address the magic link was sent to.
    pub email: String,
    /// Timestamp of the most recent sign-in, if the provider reports one.
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// A live provider session: the principal plus its bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Identity,
    pub access_token: String,
}

/// Kind of auth state change reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// An auth state change: the event kind and the session after the change
/// (`None` after sign-out).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

// =============================================================================
// SERVICE TRAIT
// =============================================================================

/// Abstract identity provider.
///
/// Implemented by [`http::HttpIdentityService`] in production and by mock
/// doubles in tests. Change events are delivered over a broadcast channel
/// shared by all subscribers, in emission order.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Fetch the current session, if any.
    ///
    /// Never errors to the caller: a transport failure is logged and
    /// reported as `None`, indistinguishable from "signed out".
    async fn get_session(&self) -> Option<Session>;

    /// Request a one-time sign-in link for `email`. The provider appends
    /// the exchange code (or error parameters) to `redirect_to`.
    async fn sign_in_with_magic_link(&self, email: &str, redirect_to: &str) -> Result<(), ProviderError>;

    /// End the current session. On success the provider emits
    /// [`AuthEventKind::SignedOut`] on the change stream.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Subscribe to auth state changes. Each receiver sees every event
    /// emitted after the call, in order.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

// =============================================================================
// TEST DOUBLES
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
