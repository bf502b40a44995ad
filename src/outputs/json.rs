//! JSON output for one-shot searches.

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::{CrawlResult, CrawlStats, ListingRecord, Query};
use crate::utils::{ensure_writable_dir, slugify_title};

/// What lands on disk: the query, when it ran, and what it found.
#[derive(Debug, Serialize)]
pub struct SavedSearch<'a> {
    pub query: &'a Query,
    pub generated_at: String,
    pub stats: &'a CrawlStats,
    pub results: Vec<ListingRecord>,
}

/// File stem for a query: its keywords, then its region.
pub fn query_slug(query: &Query) -> String {
    let mut parts = query.keywords.clone();
    parts.extend(query.region.clone());
    let slug = slugify_title(&parts.join(" "));
    if slug.is_empty() { "query".to_string() } else { slug }
}

/// Write a search result to a JSON file under a dated directory.
///
/// # Arguments
///
/// * `query` - The query that produced `result`; also names the file
/// * `result` - Listings and stats to save
/// * `output_dir` - Base directory for saved searches
///
/// # Returns
///
/// The path written: `{output_dir}/{date}/{slug}.json`, where the date is
/// local and the slug comes from [`query_slug`].
///
/// # Errors
///
/// Fails when serialization fails, the dated directory is not writable, or
/// the file cannot be written.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_results(
    query: &Query,
    result: &CrawlResult,
    output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let saved = SavedSearch {
        query,
        generated_at: Utc::now().to_rfc3339(),
        stats: &result.stats,
        results: result.records(),
    };
    let json = serde_json::to_string_pretty(&saved)?;

    let dated_dir = format!(
        "{}/{}",
        output_dir.trim_end_matches('/'),
        Local::now().date_naive()
    );
    if let Err(e) = ensure_writable_dir(&dated_dir).await {
        error!(%dated_dir, error = %e, "Output directory is not writable");
        return Err(e);
    }

    let path = PathBuf::from(&dated_dir).join(format!("{}.json", query_slug(query)));
    fs::write(&path, json).await?;
    info!(path = %path.display(), results = saved.results.len(), "Wrote search results");
    Ok(path)
}
