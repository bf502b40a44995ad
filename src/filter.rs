//! Keyword matching over listing text.
//!
//! Matching is case-insensitive substring containment. Before enrichment
//! only the listing name is searched; afterwards the haystack also holds the
//! detail body text and provider name.
//!
//! An empty keyword list matches everything. [`crate::query`] refuses to
//! build such a query so the full catalog is never returned by accident.

use crate::models::{EnrichedListing, ListingSummary, MatchPolicy, Query};

/// Test a case-folded haystack against the query keywords.
pub fn matches_text(haystack: &str, keywords: &[String], policy: MatchPolicy) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let haystack = haystack.to_lowercase();
    let mut hits = keywords.iter().map(|k| haystack.contains(&k.to_lowercase()));
    match policy {
        MatchPolicy::All => hits.all(|hit| hit),
        MatchPolicy::Any => hits.any(|hit| hit),
    }
}

/// Index-stage match: the listing name only.
pub fn matches_summary(listing: &ListingSummary, query: &Query) -> bool {
    matches_text(&listing.name, &query.keywords, query.policy)
}

/// Post-enrichment match: name, body text and provider.
pub fn matches_enriched(listing: &EnrichedListing, query: &Query) -> bool {
    let haystack = format!(
        "{} {} {}",
        listing.summary.name,
        listing.detail.body_text,
        listing.provider()
    );
    matches_text(&haystack, &query.keywords, query.policy)
}
