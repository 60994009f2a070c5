//! Todo client scoped to the signed-in user.
//!
//! SYSTEM CONTEXT
//! ==============
//! The hosted data store enforces row-level security server-side: with the
//! caller's bearer token attached, every query sees and touches only the
//! caller's rows. This client does no filtering of its own beyond scoping
//! inserts to the session's user id; a cross-identity request would be
//! rejected by the store, not by this code.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::identity::http::provider_error;
use crate::identity::{ProviderError, Session};

// =============================================================================
// TYPES
// =============================================================================

/// One todo row, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub user_id: Uuid,
    pub task: String,
    pub is_complete: bool,
    pub inserted_at: DateTime<Utc>,
}

/// Errors produced by todo operations.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// Local validation: task text is empty after trimming. No request is
    /// made.
    #[error("task text is empty")]
    EmptyTask,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Todo operations, each scoped to the caller's identity.
#[async_trait::async_trait]
pub trait TodoStore: Send + Sync {
    /// List the caller's todos, oldest first.
    async fn list_own(&self) -> Result<Vec<Todo>, TodoError>;
    /// Insert a todo for the caller. Trims `task`; rejects blank input
    /// locally.
    async fn insert_own(&self, task: &str) -> Result<Todo, TodoError>;
    /// Set the completion flag on one of the caller's todos.
    async fn set_complete(&self, id: i64, is_complete: bool) -> Result<Todo, TodoError>;
    /// Delete one of the caller's todos.
    async fn delete_own(&self, id: i64) -> Result<(), TodoError>;
}

// =============================================================================
// HTTP IMPLEMENTATION
// =============================================================================

/// [`TodoStore`] over the provider's REST surface (`/rest/v1/todos`).
pub struct HttpTodoStore {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: String,
    user_id: Uuid,
}

impl HttpTodoStore {
    /// Build a store bound to `session`'s bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::HttpClientBuild`] if the HTTP client cannot
    /// be constructed.
    pub fn new(config: &ProviderConfig, session: &Session) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            anon_key: config.anon_key.clone(),
            access_token: session.access_token.clone(),
            user_id: session.user.id,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }
}

#[async_trait::async_trait]
impl TodoStore for HttpTodoStore {
    async fn list_own(&self) -> Result<Vec<Todo>, TodoError> {
        let url = format!("{}/rest/v1/todos?select=*&order=inserted_at.asc", self.base_url);
        let body = read_success(self.request(reqwest::Method::GET, url)).await?;
        Ok(parse_todos(&body)?)
    }

    async fn insert_own(&self, task: &str) -> Result<Todo, TodoError> {
        let task = task.trim();
        if task.is_empty() {
            return Err(TodoError::EmptyTask);
        }

        let url = format!("{}/rest/v1/todos", self.base_url);
        let request = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "task": task, "user_id": self.user_id }));
        let body = read_success(request).await?;
        Ok(parse_single(&body)?)
    }

    async fn set_complete(&self, id: i64, is_complete: bool) -> Result<Todo, TodoError> {
        let url = format!("{}/rest/v1/todos?id=eq.{id}", self.base_url);
        let request = self
            .request(reqwest::Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "is_complete": is_complete }));
        let body = read_success(request).await?;
        Ok(parse_single(&body)?)
    }

    async fn delete_own(&self, id: i64) -> Result<(), TodoError> {
        let url = format!("{}/rest/v1/todos?id=eq.{id}", self.base_url);
        read_success(self.request(reqwest::Method::DELETE, url)).await?;
        Ok(())
    }
}

/// Send a request and return the body on success, mapping transport errors
/// and provider rejections to [`ProviderError`].
async fn read_success(request: reqwest::RequestBuilder) -> Result<String, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::ApiRequest(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::ApiRequest(e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(provider_error(status, &body));
    }
    Ok(body)
}

// =============================================================================
// PURE HELPERS
// =============================================================================

fn parse_todos(body: &str) -> Result<Vec<Todo>, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::ApiParse(e.to_string()))
}

/// The store returns affected rows as an array; insert and update touch
/// exactly one.
fn parse_single(body: &str) -> Result<Todo, ProviderError> {
    let mut rows = parse_todos(body)?;
    match rows.len() {
        1 => Ok(rows.remove(0)),
        n => Err(ProviderError::ApiParse(format!("expected one row, got {n}"))),
    }
}

#[cfg(test)]
#[path = "todos_test.rs"]
mod tests;
