//! Runtime configuration.
//!
//! Settings come from an optional YAML file; every field has a default so
//! the file may set only what differs. Command-line flags are applied on top
//! in `main`.
//!
//! ```yaml
//! catalog_url: https://marketplace.intacct.com/marketplace?category=all
//! concurrency: 6
//! detail_timeout_secs: 30
//! ```

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use url::Url;

use crate::error::ScoutError;
use crate::loader::LoaderSettings;
use crate::models::SearchScope;
use crate::render::retry::RetryPolicy;
use crate::scrapers::detail::{DEFAULT_COUNTRIES_MARKER, DEFAULT_PROVIDER_MARKER};
use crate::scrapers::index::DEFAULT_LISTING_PATTERN;
use crate::scrapers::{ListingExtractor, MarkerExtractor};

/// All tunables of the crawler and the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Index page that lists every catalog item.
    pub catalog_url: String,
    /// Origin that relative listing links resolve against.
    pub base_url: String,
    /// Regex a link target must match to count as a listing.
    pub listing_pattern: String,
    /// Selector that must be present before the index counts as ready.
    pub ready_selector: Option<String>,
    /// Label of the "load more" control, if the catalog has one.
    pub load_more_label: Option<String>,
    pub provider_marker: String,
    pub countries_marker: String,
    /// Hard cap on content growth iterations.
    pub max_scroll_iterations: usize,
    pub settle_delay_ms: u64,
    pub initial_settle_ms: u64,
    pub detail_settle_ms: u64,
    pub navigation_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    /// Maximum concurrent detail fetches and pooled sessions.
    pub concurrency: usize,
    /// Extra attempts per detail page after the first failure.
    pub detail_retries: usize,
    pub retry_base_delay_ms: u64,
    pub search_scope: SearchScope,
    pub user_agent: String,
    pub bind: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://marketplace.intacct.com/marketplace?category=all".to_string(),
            base_url: "https://marketplace.intacct.com".to_string(),
            listing_pattern: DEFAULT_LISTING_PATTERN.to_string(),
            ready_selector: Some("body".to_string()),
            load_more_label: Some("Load More".to_string()),
            provider_marker: DEFAULT_PROVIDER_MARKER.to_string(),
            countries_marker: DEFAULT_COUNTRIES_MARKER.to_string(),
            max_scroll_iterations: 20,
            settle_delay_ms: 1200,
            initial_settle_ms: 2000,
            detail_settle_ms: 1500,
            navigation_timeout_secs: 60,
            detail_timeout_secs: 45,
            concurrency: 5,
            detail_retries: 1,
            retry_base_delay_ms: 500,
            search_scope: SearchScope::Names,
            user_agent: format!("marketplace_scout/{}", env!("CARGO_PKG_VERSION")),
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl ScoutConfig {
    /// Load from a YAML file, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ScoutError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(Path::new(path))?;
                let config: Self = serde_yaml::from_str(&raw)?;
                info!(path, "Loaded configuration file");
                config
            }
            None => Self::default(),
        };
        config.validated()
    }

    /// Clamp numeric bounds and reject unusable urls or patterns.
    pub fn validated(mut self) -> Result<Self, ScoutError> {
        self.concurrency = self.concurrency.max(1);
        self.max_scroll_iterations = self.max_scroll_iterations.max(1);
        Url::parse(&self.catalog_url)
            .map_err(|e| ScoutError::Config(format!("catalog_url `{}`: {e}", self.catalog_url)))?;
        self.base()?;
        self.listing_regex()?;
        self.text_extractor()?;
        Ok(self)
    }

    pub fn base(&self) -> Result<Url, ScoutError> {
        Url::parse(&self.base_url)
            .map_err(|e| ScoutError::Config(format!("base_url `{}`: {e}", self.base_url)))
    }

    fn listing_regex(&self) -> Result<Regex, ScoutError> {
        Regex::new(&self.listing_pattern)
            .map_err(|e| ScoutError::Config(format!("listing_pattern: {e}")))
    }

    pub fn listing_extractor(&self) -> Result<ListingExtractor, ScoutError> {
        Ok(ListingExtractor::new(self.base()?, self.listing_regex()?))
    }

    pub fn text_extractor(&self) -> Result<MarkerExtractor, ScoutError> {
        MarkerExtractor::new(&self.provider_marker, &self.countries_marker)
            .map_err(|e| ScoutError::Config(format!("markers: {e}")))
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            max_iterations: self.max_scroll_iterations,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            initial_settle: Duration::from_millis(self.initial_settle_ms),
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            ready_selector: self.ready_selector.clone(),
            load_more_label: self.load_more_label.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.detail_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    pub fn detail_settle(&self) -> Duration {
        Duration::from_millis(self.detail_settle_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScoutConfig::default().validated().unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.max_scroll_iterations, 20);
        assert_eq!(config.search_scope, SearchScope::Names);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: ScoutConfig = serde_yaml::from_str("concurrency: 0\ndetail_timeout_secs: 30\n").unwrap();
        let config = config.validated().unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.detail_timeout(), Duration::from_secs(30));
        assert_eq!(config.base_url, "https://marketplace.intacct.com");
    }

    #[test]
    fn test_search_scope_from_yaml() {
        let config: ScoutConfig = serde_yaml::from_str("search_scope: full_text\n").unwrap();
        assert_eq!(config.search_scope, SearchScope::FullText);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = ScoutConfig {
            listing_pattern: "MPListing(".to_string(),
            ..ScoutConfig::default()
        };
        assert!(matches!(config.validated(), Err(ScoutError::Config(_))));
    }

    #[test]
    fn test_invalid_base_rejected() {
        let config = ScoutConfig {
            base_url: "not a url".to_string(),
            ..ScoutConfig::default()
        };
        assert!(matches!(config.validated(), Err(ScoutError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("scout-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "bind: 127.0.0.1:9000\nload_more_label: null\n").unwrap();
        let config = ScoutConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.load_more_label, None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            ScoutConfig::load(Some("/definitely/not/here.yaml")),
            Err(ScoutError::Io(_))
        ));
    }
}
