//! Data models for catalog listings and query results.
//!
//! This module defines the records that flow through one query execution:
//! - [`ListingSummary`]: a listing discovered on the index page
//! - [`ListingDetail`]: fields scraped from the listing's detail page
//! - [`EnrichedListing`]: the two joined, the unit returned to callers
//! - [`CrawlResult`]: the ordered, deduplicated output of one pipeline run
//! - [`ListingRecord`] / [`AskResponse`]: the flat shapes served over HTTP
//!
//! Everything here is created fresh per query; nothing is shared between
//! executions.

use serde::{Deserialize, Serialize};

/// A listing as found on the catalog index page.
///
/// Identity is the absolute, normalized `url`. Two summaries with the same
/// url are the same listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSummary {
    /// Display name taken from the listing anchor.
    pub name: String,
    /// Absolute detail-page url (fragment stripped).
    pub url: String,
    /// Provider name seen next to the anchor on the index page, if any.
    ///
    /// Used as a fallback when the detail page carries no `by:` marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_hint: Option<String>,
}

impl ListingSummary {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            provider_hint: None,
        }
    }
}

/// Fields scraped from one listing's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDetail {
    /// Provider name following the `by:` marker; empty when absent.
    pub provider_name: String,
    /// Canonical country names, in page order, without duplicates.
    pub approved_countries: Vec<String>,
    /// Visible page text collapsed to single spaces.
    pub body_text: String,
    /// Set when the detail page could not be fetched or parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl ListingDetail {
    /// Placeholder detail for a listing whose fetch failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            fetch_error: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.fetch_error.is_some()
    }
}

/// A [`ListingSummary`] joined with its [`ListingDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedListing {
    pub summary: ListingSummary,
    pub detail: ListingDetail,
}

impl EnrichedListing {
    /// Provider from the detail page, falling back to the index-page hint.
    pub fn provider(&self) -> &str {
        if !self.detail.provider_name.is_empty() {
            return &self.detail.provider_name;
        }
        self.summary.provider_hint.as_deref().unwrap_or_default()
    }
}

/// How multiple query keywords combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Every keyword must be contained in the haystack.
    All,
    /// At least one keyword must be contained in the haystack.
    #[default]
    Any,
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(format!("unknown match policy `{other}` (expected `all` or `any`)")),
        }
    }
}

/// Which text the keyword filter searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Listing names only, filtered before any detail page is fetched.
    #[default]
    Names,
    /// Name, provider and detail body text; every listing is enriched first.
    FullText,
}

/// A normalized query handed to the pipeline.
///
/// Built through [`crate::query`], which guarantees `keywords` is non-empty
/// and case-folded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub keywords: Vec<String>,
    pub region: Option<String>,
    pub policy: MatchPolicy,
    pub scope: SearchScope,
}

/// Counters gathered over one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Unique listings found on the index page.
    pub indexed: usize,
    /// Listings that passed the keyword filter.
    pub keyword_matches: usize,
    /// Enriched listings whose detail fetch failed.
    pub fetch_failures: usize,
    /// Growth iterations performed by the content loader.
    pub load_iterations: usize,
    /// Whether the loader stopped because the page stopped growing.
    pub converged: bool,
}

/// Ordered, url-deduplicated output of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlResult {
    pub listings: Vec<EnrichedListing>,
    pub stats: CrawlStats,
}

impl CrawlResult {
    pub fn records(&self) -> Vec<ListingRecord> {
        self.listings.iter().map(ListingRecord::from).collect()
    }
}

/// Flat record served by the query endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: String,
    pub provider: String,
    pub url: String,
    pub approved_countries: Vec<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl From<&EnrichedListing> for ListingRecord {
    fn from(listing: &EnrichedListing) -> Self {
        Self {
            name: listing.summary.name.clone(),
            provider: listing.provider().to_string(),
            url: listing.summary.url.clone(),
            approved_countries: listing.detail.approved_countries.clone(),
            text: listing.detail.body_text.clone(),
            fetch_error: listing.detail.fetch_error.clone(),
        }
    }
}

/// Response body of the natural-language endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub query: String,
    pub keywords_used: Vec<String>,
    pub region_used: Option<String>,
    pub count: usize,
    pub results: Vec<ListingRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched(provider_name: &str, hint: Option<&str>) -> EnrichedListing {
        EnrichedListing {
            summary: ListingSummary {
                name: "AP Automation Pro".to_string(),
                url: "https://example.com/MPListing?lid=1".to_string(),
                provider_hint: hint.map(str::to_string),
            },
            detail: ListingDetail {
                provider_name: provider_name.to_string(),
                approved_countries: vec!["United Kingdom".to_string()],
                body_text: "AP Automation Pro by: Acme".to_string(),
                fetch_error: None,
            },
        }
    }

    #[test]
    fn test_provider_prefers_detail_page() {
        let listing = enriched("Acme", Some("Other"));
        assert_eq!(listing.provider(), "Acme");
    }

    #[test]
    fn test_provider_falls_back_to_hint() {
        assert_eq!(enriched("", Some("Acme")).provider(), "Acme");
        assert_eq!(enriched("", None).provider(), "");
    }

    #[test]
    fn test_failed_detail() {
        let detail = ListingDetail::failed("timed out");
        assert!(detail.is_failed());
        assert!(detail.approved_countries.is_empty());
        assert_eq!(detail.fetch_error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_match_policy_from_str() {
        assert_eq!("ALL".parse::<MatchPolicy>(), Ok(MatchPolicy::All));
        assert_eq!(" any ".parse::<MatchPolicy>(), Ok(MatchPolicy::Any));
        assert!("some".parse::<MatchPolicy>().is_err());
    }

    #[test]
    fn test_record_serialization_skips_missing_error() {
        let record = ListingRecord::from(&enriched("Acme", None));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["provider"], "Acme");
        assert_eq!(json["approved_countries"][0], "United Kingdom");
        assert!(json.get("fetch_error").is_none());
    }
}
