//! Query orchestration.
//!
//! One [`Pipeline::run`] walks a query through these stages:
//!
//! 1. **Loading**: open the catalog index and grow it until it converges
//! 2. **Extracting**: pull unique listing links out of the final markup
//! 3. **FilteringKeywords**: drop listings that miss the keywords
//! 4. **Enriching**: fetch detail pages concurrently
//! 5. **FilteringRegion**: keep listings approved for the region, if any
//!
//! With [`SearchScope::FullText`] stages 3 and 4 swap: every listing is
//! enriched and the keyword filter then also sees body text and provider.
//!
//! Only a failed index load ends a run early. Each run owns its own results;
//! concurrent runs share nothing but the session pool.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::config::ScoutConfig;
use crate::enrich::{enrich_listings, EnrichSettings};
use crate::error::{RenderError, ScoutError};
use crate::filter::{matches_enriched, matches_summary};
use crate::loader::{load_fully, LoaderSettings};
use crate::models::{CrawlResult, CrawlStats, EnrichedListing, ListingSummary, Query, SearchScope};
use crate::region::filter_by_region;
use crate::render::{RenderProvider, RenderSession, SessionPool};
use crate::scrapers::{ListingExtractor, TextExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Extracting,
    FilteringKeywords,
    Enriching,
    FilteringRegion,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Extracting => "extracting",
            Stage::FilteringKeywords => "filtering_keywords",
            Stage::Enriching => "enriching",
            Stage::FilteringRegion => "filtering_region",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct Pipeline<P: RenderProvider> {
    pool: Arc<SessionPool<P>>,
    catalog_url: String,
    loader: LoaderSettings,
    enrich: EnrichSettings,
    default_scope: SearchScope,
    listings: ListingExtractor,
    text: Box<dyn TextExtractor>,
}

impl<P: RenderProvider> Pipeline<P> {
    /// Build a pipeline whose pool holds at most `config.concurrency` sessions.
    pub fn from_config(provider: P, config: &ScoutConfig) -> Result<Self, ScoutError> {
        Ok(Self {
            pool: Arc::new(SessionPool::new(provider, config.concurrency)),
            catalog_url: config.catalog_url.clone(),
            loader: config.loader_settings(),
            enrich: EnrichSettings {
                concurrency: config.concurrency,
                timeout: config.detail_timeout(),
                settle: config.detail_settle(),
                retry: config.retry_policy(),
            },
            default_scope: config.search_scope,
            listings: config.listing_extractor()?,
            text: Box::new(config.text_extractor()?),
        })
    }

    pub fn pool(&self) -> &SessionPool<P> {
        &self.pool
    }

    pub fn catalog_url(&self) -> &str {
        &self.catalog_url
    }

    /// Scope used when a caller does not pick one.
    pub fn default_scope(&self) -> SearchScope {
        self.default_scope
    }

    /// Execute `query` against the live catalog.
    #[instrument(level = "info", skip(self), fields(catalog = %self.catalog_url, provider = self.pool.provider().name()))]
    pub async fn run(&self, query: &Query) -> Result<CrawlResult, ScoutError> {
        let mut stats = CrawlStats::default();

        enter(Stage::Loading);
        let markup = match self.load_index(&mut stats).await {
            Ok(markup) => markup,
            Err(e) => {
                enter(Stage::Failed);
                error!(error = %e, "Catalog index failed to load; aborting query");
                return Err(e);
            }
        };

        enter(Stage::Extracting);
        let summaries = self.listings.extract(&markup, self.text.as_ref());
        stats.indexed = summaries.len();

        let enriched = match query.scope {
            SearchScope::Names => {
                enter(Stage::FilteringKeywords);
                let matched: Vec<ListingSummary> = summaries
                    .into_iter()
                    .filter(|s| matches_summary(s, query))
                    .collect();
                stats.keyword_matches = matched.len();
                info!(matched = matched.len(), indexed = stats.indexed, "Keyword filter applied to names");

                enter(Stage::Enriching);
                self.enrich(matched).await
            }
            SearchScope::FullText => {
                enter(Stage::Enriching);
                let all = self.enrich(summaries).await;

                enter(Stage::FilteringKeywords);
                let matched: Vec<EnrichedListing> = all
                    .into_iter()
                    .filter(|l| matches_enriched(l, query))
                    .collect();
                stats.keyword_matches = matched.len();
                info!(matched = matched.len(), indexed = stats.indexed, "Keyword filter applied to full text");
                matched
            }
        };
        stats.fetch_failures = enriched.iter().filter(|l| l.detail.is_failed()).count();

        let listings = match query.region.as_deref() {
            Some(region) => {
                enter(Stage::FilteringRegion);
                let before = enriched.len();
                let kept = filter_by_region(enriched, region);
                info!(%region, before, after = kept.len(), "Region filter applied");
                kept
            }
            None => enriched,
        };

        enter(Stage::Done);
        info!(
            results = listings.len(),
            indexed = stats.indexed,
            keyword_matches = stats.keyword_matches,
            fetch_failures = stats.fetch_failures,
            idle_sessions = self.pool.idle_count(),
            free_permits = self.pool.available(),
            "Query complete"
        );
        Ok(CrawlResult { listings, stats })
    }

    /// Load the index through a pooled session and return its final markup.
    /// The session goes back to the pool before enrichment starts.
    async fn load_index(&self, stats: &mut CrawlStats) -> Result<String, ScoutError> {
        let load_error = |source: RenderError| ScoutError::Load {
            url: self.catalog_url.clone(),
            source,
        };

        let mut session = self.pool.acquire().await.map_err(load_error)?;
        let report = match load_fully(&mut *session, &self.catalog_url, &self.loader).await {
            Ok(report) => report,
            Err(e) => {
                session.discard();
                return Err(e);
            }
        };
        stats.load_iterations = report.iterations;
        stats.converged = report.converged;
        debug!(iterations = report.iterations, final_signal = report.final_signal, "Index loaded");

        match session.content().await {
            Ok(markup) => Ok(markup),
            Err(source) => {
                session.discard();
                Err(load_error(source))
            }
        }
    }

    async fn enrich(&self, summaries: Vec<ListingSummary>) -> Vec<EnrichedListing> {
        enrich_listings(&self.pool, self.text.as_ref(), summaries, &self.enrich).await
    }
}

fn enter(stage: Stage) {
    info!(%stage, "Pipeline stage");
}
