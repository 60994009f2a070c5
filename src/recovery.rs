//! Redirect error classification and recovery.
//!
//! When a magic link cannot be exchanged for a session, the provider sends
//! the user back with `error`, `error_code`, and `error_description` query
//! parameters instead of a code. Classification is a pure function over
//! those three optional strings; every category offers the same recovery —
//! a fresh link request — because an expired or denied link is never
//! retried with the old code.

use std::sync::Arc;

use crate::flow::{FlowState, MagicLinkFlow};
use crate::identity::IdentityService;

const OTP_EXPIRED_CODE: &str = "otp_expired";
const ACCESS_DENIED_TAG: &str = "access_denied";

pub const GENERIC_DESCRIPTION: &str = "There was an error with your authentication link.";

// =============================================================================
// ERROR CONTEXT
// =============================================================================

/// Error parameters carried by the redirect. Parsed once per page load,
/// never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

impl ErrorContext {
    /// Parse a redirect query string (with or without the leading `?`).
    /// Unknown parameters are ignored; repeated parameters keep the last
    /// value.
    #[must_use]
    pub fn from_query(raw_query: &str) -> Self {
        let raw = raw_query.trim_start_matches('?');
        let mut ctx = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "error" => ctx.error = Some(value.into_owned()),
                "error_code" => ctx.error_code = Some(value.into_owned()),
                "error_description" => ctx.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        ctx
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Failure category shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The link was valid but its validity window passed.
    LinkExpired,
    /// The provider refused the authentication request.
    AccessDenied,
    /// Anything else.
    Generic,
}

/// Presentational triple for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub title: &'static str,
    pub description: String,
    pub suggestion: &'static str,
}

/// Classify redirect error parameters. Pure; first match wins:
/// `error_code == "otp_expired"`, then `error == "access_denied"`, then
/// generic with the supplied description or a fixed fallback.
#[must_use]
pub fn classify(ctx: &ErrorContext) -> ErrorInfo {
    if ctx.error_code.as_deref() == Some(OTP_EXPIRED_CODE) {
        return ErrorInfo {
            category: ErrorCategory::LinkExpired,
            title: "Magic Link Expired",
            description: "Your email link has expired. Magic links are only valid for a limited time.".to_owned(),
            suggestion: "Request a new magic link below to continue signing in.",
        };
    }

    if ctx.error.as_deref() == Some(ACCESS_DENIED_TAG) {
        return ErrorInfo {
            category: ErrorCategory::AccessDenied,
            title: "Access Denied",
            description: "There was an issue with your authentication request.".to_owned(),
            suggestion: "Please try signing in again with a fresh magic link.",
        };
    }

    ErrorInfo {
        category: ErrorCategory::Generic,
        title: "Authentication Error",
        description: ctx
            .error_description
            .clone()
            .unwrap_or_else(|| GENERIC_DESCRIPTION.to_owned()),
        suggestion: "Please try signing in again.",
    }
}

// =============================================================================
// RECOVERY PAGE
// =============================================================================

/// View model for the redirect error page: the classified failure plus an
/// inline resend form. Resend failures become form messages, never errors
/// out of the page.
pub struct RecoveryPage {
    info: ErrorInfo,
    resend: MagicLinkFlow,
}

impl RecoveryPage {
    /// Build the page from the redirect's error parameters.
    #[must_use]
    pub fn new(ctx: &ErrorContext, service: Arc<dyn IdentityService>, redirect_target: impl Into<String>) -> Self {
        Self {
            info: classify(ctx),
            resend: MagicLinkFlow::new(service, redirect_target),
        }
    }

    #[must_use]
    pub fn info(&self) -> &ErrorInfo {
        &self.info
    }

    /// Update the resend form's email field.
    pub fn set_email(&self, value: &str) {
        self.resend.set_email(value);
    }

    /// Request a fresh magic link with the entered email. Same transitions
    /// and messages as the login form.
    pub async fn resend(&self) -> FlowState {
        self.resend.request_link().await
    }

    /// Resend form snapshot for rendering.
    #[must_use]
    pub fn resend_state(&self) -> FlowState {
        self.resend.state()
    }
}

#[cfg(test)]
#[path = "recovery_test.rs"]
mod tests;
