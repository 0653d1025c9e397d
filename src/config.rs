//! Remote catalog configuration.
//!
//! Configuration is an explicitly constructed value handed to the
//! downloader. Nothing in this crate reads process-wide state: the host
//! CLI's config layer builds a [`RemoteConfig`] and passes it down.

use std::time::Duration;

/// The public Codevet rules catalog.
pub const DEFAULT_CATALOG_URL: &str = "https://rules.codevet.dev/api/v1";

/// Network timeout applied to each catalog request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the remote rules catalog.
///
/// # Examples
///
/// ```
/// use codevet_rules::config::RemoteConfig;
///
/// let config = RemoteConfig::default().with_api_key("cv_live_0123");
/// assert!(config.api_key.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the catalog API.
    pub base_url: String,
    /// Bearer token for authenticated catalogs, when configured.
    pub api_key: Option<String>,
    /// Per-request timeout bounding the download suspension point.
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_URL.to_owned(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RemoteConfig {
    /// Build a configuration pointing at a custom catalog.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Attach an API key sent as a bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_public_catalog() {
        let config = RemoteConfig::default();
        assert_eq!(config.base_url, DEFAULT_CATALOG_URL);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn builders_override_fields() {
        let config = RemoteConfig::new("https://rules.example.test")
            .with_api_key("cv_test_key")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "https://rules.example.test");
        assert_eq!(config.api_key.as_deref(), Some("cv_test_key"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
