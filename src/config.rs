//! Provider configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every external call this crate makes goes to one hosted provider (auth
//! and data store share a base URL and an anon key). The binary loads
//! `.env` via dotenvy before calling [`ProviderConfig::from_env`]; the
//! library itself never touches the environment outside this module.

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while assembling provider configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing env var: {var}")]
    MissingVar { var: String },
}

/// Connection settings for the hosted identity/data provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider base URL, no trailing slash.
    pub base_url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Absolute URL the magic link redirects back to.
    pub redirect_target: String,
    /// Per-request deadline for provider calls.
    pub request_timeout_secs: u64,
    /// TCP connect deadline for provider calls.
    pub connect_timeout_secs: u64,
}

impl ProviderConfig {
    /// Build a config from explicit parts, applying default timeouts.
    #[must_use]
    pub fn new(base_url: &str, anon_key: &str, redirect_target: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.to_owned(),
            redirect_target: redirect_target.to_owned(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Build typed provider config from environment variables.
    ///
    /// Required:
    /// - `AIRESTATE_AUTH_URL`: provider base URL
    /// - `AIRESTATE_AUTH_ANON_KEY`: public API key
    /// - `AIRESTATE_REDIRECT_URL`: magic-link redirect target
    ///
    /// Optional:
    /// - `AIRESTATE_REQUEST_TIMEOUT_SECS`: default 15
    /// - `AIRESTATE_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if a required variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = require_var("AIRESTATE_AUTH_URL")?;
        let anon_key = require_var("AIRESTATE_AUTH_ANON_KEY")?;
        let redirect_target = require_var("AIRESTATE_REDIRECT_URL")?;

        let mut config = Self::new(&base_url, &anon_key, &redirect_target);
        config.request_timeout_secs = env_parse("AIRESTATE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS);
        config.connect_timeout_secs = env_parse("AIRESTATE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS);
        Ok(config)
    }
}

fn require_var(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar { var: var.to_owned() })
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
