//! Magic-link flow controller — per-form request state machine.
//!
//! DESIGN
//! ======
//! `Idle → Submitting → {Sent, Failed}`, with `Idle` reachable again when
//! the user edits the email after a result. State is per-form and never
//! shared: each [`MagicLinkFlow`] owns its own [`FlowState`] and talks to
//! the injected identity service.
//!
//! Exactly one link request may be in flight per form. The in-flight guard
//! is the `Submitting` phase itself, set under the state lock before the
//! await and cleared when the result is written back; a second submission
//! while `Submitting` is a no-op. Every failure path — provider rejection,
//! transport error, timeout — lands in `Failed` with a display message and
//! never escapes the controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::identity::{IdentityService, ProviderError};

/// Deadline for one link request before the controller gives up and shows
/// the timeout message instead of hanging in `Submitting`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const VALIDATION_MESSAGE: &str = "Please enter your email address";
pub const SENT_MESSAGE: &str = "Check your email for the magic link!";
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";
pub const TIMEOUT_MESSAGE: &str = "The request timed out. Please try again.";

// =============================================================================
// STATE
// =============================================================================

/// Phase of the request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    Idle,
    Submitting,
    Sent,
    Failed,
}

/// Display state for one sign-in form instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowState {
    pub email_input: String,
    pub phase: FlowPhase,
    pub status_message: Option<String>,
}

impl FlowState {
    fn idle() -> Self {
        Self {
            email_input: String::new(),
            phase: FlowPhase::Idle,
            status_message: None,
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Drives one magic-link sign-in form.
pub struct MagicLinkFlow {
    service: Arc<dyn IdentityService>,
    redirect_target: String,
    request_timeout: Duration,
    state: Mutex<FlowState>,
}

impl MagicLinkFlow {
    /// Create an idle form bound to `service`. The provider appends the
    /// exchange code (or error parameters) to `redirect_target`.
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>, redirect_target: impl Into<String>) -> Self {
        Self {
            service,
            redirect_target: redirect_target.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state: Mutex::new(FlowState::idle()),
        }
    }

    /// Override the per-request deadline.
    #[must_use]
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Update the email field. Editing after a result clears it: the form
    /// returns to `Idle` and the previous message is dropped.
    pub fn set_email(&self, value: &str) {
        let mut state = self.lock();
        state.email_input = value.to_owned();
        if matches!(state.phase, FlowPhase::Sent | FlowPhase::Failed) {
            state.phase = FlowPhase::Idle;
            state.status_message = None;
        }
    }

    /// Snapshot for rendering.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.lock().clone()
    }

    /// Submit the form.
    ///
    /// Empty or whitespace input produces a local validation message and
    /// makes no provider call. While a request is in flight, further
    /// submissions return the current state without side effects. The
    /// result replaces any previous message; only the most recent outcome
    /// is displayed.
    pub async fn request_link(&self) -> FlowState {
        let email = {
            let mut state = self.lock();
            if state.phase == FlowPhase::Submitting {
                return state.clone();
            }
            let email = state.email_input.trim().to_owned();
            if email.is_empty() {
                state.status_message = Some(VALIDATION_MESSAGE.to_owned());
                return state.clone();
            }
            state.phase = FlowPhase::Submitting;
            state.status_message = None;
            email
        };

        let call = self.service.sign_in_with_magic_link(&email, &self.redirect_target);
        let outcome = tokio::time::timeout(self.request_timeout, call).await;

        let mut state = self.lock();
        match outcome {
            Ok(Ok(())) => {
                state.phase = FlowPhase::Sent;
                state.status_message = Some(SENT_MESSAGE.to_owned());
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "magic link request rejected");
                state.phase = FlowPhase::Failed;
                state.status_message = Some(display_message(&e));
            }
            Err(_elapsed) => {
                tracing::warn!(timeout_secs = self.request_timeout.as_secs(), "magic link request timed out");
                state.phase = FlowPhase::Failed;
                state.status_message = Some(TIMEOUT_MESSAGE.to_owned());
            }
        }
        state.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Provider-supplied message when present, generic fallback otherwise.
/// Transport and parse diagnostics are logged, not shown raw to the user.
fn display_message(error: &ProviderError) -> String {
    error
        .provider_message()
        .unwrap_or(FALLBACK_MESSAGE)
        .to_owned()
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;
