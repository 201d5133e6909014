//! Service configuration
//!
//! The hosted service is addressed by two externally supplied values: the
//! service URL and the access key. Both are read from the environment in
//! production and set explicitly in tests.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the service URL
pub const SERVICE_URL_ENV: &str = "FARMTRACK_SERVICE_URL";

/// Environment variable holding the access key
pub const SERVICE_KEY_ENV: &str = "FARMTRACK_SERVICE_KEY";

/// URL used when no service is configured
pub const PLACEHOLDER_URL: &str = "https://placeholder.supabase.co";

/// Key used when no service is configured
pub const PLACEHOLDER_KEY: &str = "placeholder_key";

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base service URL (e.g., "https://abc.supabase.co")
    pub service_url: String,
    /// Access key sent as `apikey` and bearer token
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Custom headers to include in all requests
    pub default_headers: HashMap<String, String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_url: PLACEHOLDER_URL.to_string(),
            api_key: PLACEHOLDER_KEY.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("FarmTrack/{}", env!("CARGO_PKG_VERSION")),
            default_headers: HashMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Create a new config with a service URL and access key
    pub fn new(service_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { service_url: service_url.into(), api_key: api_key.into(), ..Default::default() }
    }

    /// Read the service URL and key from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the service URL and key through a lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup(SERVICE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(SERVICE_URL_ENV))?;
        let key = lookup(SERVICE_KEY_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(SERVICE_KEY_ENV))?;
        Ok(Self::new(url.trim(), key.trim()))
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Whether the values look like a real service
    ///
    /// This is a static check: it does not contact the service. Use a probe
    /// request to find out whether the service is actually reachable.
    pub fn is_configured(&self) -> bool {
        let url = self.service_url.trim();
        let key = self.api_key.trim();

        if url.is_empty() || key.is_empty() {
            return false;
        }
        if url == PLACEHOLDER_URL || key == PLACEHOLDER_KEY {
            return false;
        }

        match reqwest::Url::parse(url) {
            Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
            Err(_) => false,
        }
    }

    /// Full URL of a REST path (e.g. `farmers` or `rpc/create_farmer`)
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.service_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_is_unconfigured() {
        let config = ServiceConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("FarmTrack/"));
    }

    #[test]
    fn test_real_values_are_configured() {
        let config = ServiceConfig::new("https://abc.supabase.co", "anon-key");
        assert!(config.is_configured());

        let local = ServiceConfig::new("http://127.0.0.1:54321", "anon-key");
        assert!(local.is_configured());
    }

    #[test]
    fn test_placeholders_and_garbage_are_unconfigured() {
        assert!(!ServiceConfig::new(PLACEHOLDER_URL, "anon-key").is_configured());
        assert!(!ServiceConfig::new("https://abc.supabase.co", PLACEHOLDER_KEY).is_configured());
        assert!(!ServiceConfig::new("https://abc.supabase.co", "  ").is_configured());
        assert!(!ServiceConfig::new("not a url", "anon-key").is_configured());
        assert!(!ServiceConfig::new("ftp://abc.example.com", "anon-key").is_configured());
    }

    #[test]
    fn test_from_lookup() {
        let config = ServiceConfig::from_lookup(lookup(&[
            (SERVICE_URL_ENV, "https://abc.supabase.co/"),
            (SERVICE_KEY_ENV, "anon-key"),
        ]))
        .unwrap();

        assert_eq!(config.service_url, "https://abc.supabase.co/");
        assert_eq!(config.rest_url("farmers"), "https://abc.supabase.co/rest/v1/farmers");
    }

    #[test]
    fn test_from_lookup_missing_values() {
        let err = ServiceConfig::from_lookup(lookup(&[(SERVICE_URL_ENV, "https://a.b")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing(SERVICE_KEY_ENV));

        let err = ServiceConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(SERVICE_URL_ENV));
    }

    #[test]
    fn test_builder() {
        let config = ServiceConfig::new("https://abc.supabase.co", "k")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("Test/1.0")
            .with_header("X-Client-Info", "farmtrack");

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "Test/1.0");
        assert_eq!(
            config.default_headers.get("X-Client-Info"),
            Some(&"farmtrack".to_string())
        );
    }
}
