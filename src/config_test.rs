use super::*;

#[test]
fn new_trims_trailing_slash_and_applies_default_timeouts() {
    let config = ProviderConfig::new("https://provider.invalid/", "anon", "https://app.example.com/cb");
    assert_eq!(config.base_url, "https://provider.invalid");
    assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
}

/// # Safety
/// Single test mutates the AIRESTATE_* env vars so parallel test threads
/// never race on them.
#[test]
fn from_env_requires_vars_and_reads_overrides() {
    unsafe {
        std::env::remove_var("AIRESTATE_AUTH_URL");
        std::env::remove_var("AIRESTATE_AUTH_ANON_KEY");
        std::env::remove_var("AIRESTATE_REDIRECT_URL");
        std::env::remove_var("AIRESTATE_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("AIRESTATE_CONNECT_TIMEOUT_SECS");
    }

    match ProviderConfig::from_env() {
        Err(ConfigError::MissingVar { var }) => assert_eq!(var, "AIRESTATE_AUTH_URL"),
        other => panic!("expected MissingVar, got {other:?}"),
    }

    unsafe {
        std::env::set_var("AIRESTATE_AUTH_URL", "https://provider.invalid/");
        std::env::set_var("AIRESTATE_AUTH_ANON_KEY", "anon");
    }
    match ProviderConfig::from_env() {
        Err(ConfigError::MissingVar { var }) => assert_eq!(var, "AIRESTATE_REDIRECT_URL"),
        other => panic!("expected MissingVar, got {other:?}"),
    }

    unsafe {
        std::env::set_var("AIRESTATE_REDIRECT_URL", "https://app.example.com/auth/callback");
        std::env::set_var("AIRESTATE_REQUEST_TIMEOUT_SECS", "30");
    }
    let config = ProviderConfig::from_env().unwrap();
    assert_eq!(config.base_url, "https://provider.invalid");
    assert_eq!(config.anon_key, "anon");
    assert_eq!(config.redirect_target, "https://app.example.com/auth/callback");
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);

    unsafe {
        std::env::remove_var("AIRESTATE_AUTH_URL");
        std::env::remove_var("AIRESTATE_AUTH_ANON_KEY");
        std::env::remove_var("AIRESTATE_REDIRECT_URL");
        std::env::remove_var("AIRESTATE_REQUEST_TIMEOUT_SECS");
    }
}
