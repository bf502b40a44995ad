//! Detail enrichment: fetch each candidate's detail page and extract its
//! fields, at most `concurrency` pages at a time.
//!
//! Every fetch is isolated. A navigation error, timeout or empty page for
//! one listing becomes that listing's `fetch_error`; siblings and the batch
//! carry on. The output holds exactly one [`EnrichedListing`] per input
//! summary, in input order.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::RenderError;
use crate::models::{EnrichedListing, ListingDetail, ListingSummary};
use crate::render::retry::{with_backoff, RetryPolicy};
use crate::render::{fetch_markup, RenderProvider, SessionPool};
use crate::scrapers::TextExtractor;
use crate::utils::truncate_for_log;

/// Per-fetch limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichSettings {
    pub concurrency: usize,
    /// Bound on one attempt: navigation, settle and markup read.
    pub timeout: Duration,
    /// Wait after navigation before reading markup.
    pub settle: Duration,
    pub retry: RetryPolicy,
}

/// Enrich `summaries` through sessions from `pool`.
///
/// # Arguments
///
/// * `pool` - Source of render sessions; its capacity also bounds fetches
/// * `extractor` - Parses each detail page into provider, countries and text
/// * `summaries` - Listings to enrich
/// * `settings` - Concurrency, per-attempt timeout, settle delay and retries
///
/// # Returns
///
/// One [`EnrichedListing`] per summary, in input order. Failed fetches carry
/// their reason in `fetch_error` instead of failing the batch.
#[instrument(level = "info", skip_all, fields(count = summaries.len(), concurrency = settings.concurrency))]
pub async fn enrich_listings<P: RenderProvider>(
    pool: &SessionPool<P>,
    extractor: &dyn TextExtractor,
    summaries: Vec<ListingSummary>,
    settings: &EnrichSettings,
) -> Vec<EnrichedListing> {
    let total = summaries.len();
    let mut enriched: Vec<(usize, EnrichedListing)> = stream::iter(summaries.into_iter().enumerate())
        .map(|(i, summary)| async move {
            let detail = fetch_detail(pool, extractor, &summary.url, settings).await;
            (i, EnrichedListing { summary, detail })
        })
        .buffer_unordered(settings.concurrency.max(1))
        .collect()
        .await;
    enriched.sort_by_key(|(i, _)| *i);

    let failed = enriched.iter().filter(|(_, l)| l.detail.is_failed()).count();
    info!(total, succeeded = total - failed, failed, "Completed detail enrichment");
    enriched.into_iter().map(|(_, listing)| listing).collect()
}

/// Fetch and parse one detail page. Never fails: errors land in `fetch_error`.
async fn fetch_detail<P: RenderProvider>(
    pool: &SessionPool<P>,
    extractor: &dyn TextExtractor,
    url: &str,
    settings: &EnrichSettings,
) -> ListingDetail {
    let fetched = with_backoff(&settings.retry, url, |attempt| async move {
        let mut session = pool.acquire().await?;
        let fetched = fetch_markup(&mut *session, url, settings.timeout, settings.settle)
            .await
            .and_then(|markup| {
                if markup.trim().is_empty() {
                    Err(RenderError::NoPage)
                } else {
                    Ok(markup)
                }
            });
        match fetched {
            Ok(markup) => Ok(markup),
            Err(e) => {
                debug!(%url, attempt, error = %e, "Discarding session after failed fetch");
                session.discard();
                Err(e)
            }
        }
    })
    .await;

    match fetched {
        Ok(markup) => {
            let fields = extractor.extract_page(&markup);
            debug!(
                %url,
                provider = %fields.provider_name,
                countries = ?fields.approved_countries,
                preview = %truncate_for_log(&fields.body_text, 120),
                "Extracted listing detail"
            );
            ListingDetail {
                provider_name: fields.provider_name,
                approved_countries: fields.approved_countries,
                body_text: fields.body_text,
                fetch_error: None,
            }
        }
        Err(e) => {
            warn!(%url, error = %e, "Detail fetch failed; keeping listing with fetch_error");
            ListingDetail::failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::render::testing::{Page, ScriptedProvider};
    use crate::scrapers::MarkerExtractor;

    fn settings(concurrency: usize, timeout: Duration) -> EnrichSettings {
        EnrichSettings {
            concurrency,
            timeout,
            settle: Duration::ZERO,
            retry: RetryPolicy::none(),
        }
    }

    fn detail_page(provider: &str, countries: &str) -> Page {
        Page::Markup(format!(
            "<html><body><h1>Listing</h1><p>by: {provider}</p>\
             <p>Integration Approved Countries: {countries}</p></body></html>"
        ))
    }

    #[tokio::test]
    async fn test_one_timeout_does_not_sink_the_batch() {
        let mut pages: Vec<(String, Page)> = (0..10)
            .map(|i| (format!("https://catalog.test/l/{i}"), detail_page("Acme", "United Kingdom")))
            .collect();
        pages[3].1 = Page::Hang(Duration::from_secs(10), "<p>too late</p>".to_string());
        let provider = ScriptedProvider::with_pages(pages.clone());
        let pool = SessionPool::new(provider, 4);

        let summaries: Vec<ListingSummary> = pages
            .iter()
            .enumerate()
            .map(|(i, (url, _))| ListingSummary::new(format!("Listing {i}"), url.clone()))
            .collect();

        let enriched = enrich_listings(
            &pool,
            &MarkerExtractor::default(),
            summaries.clone(),
            &settings(4, Duration::from_millis(200)),
        )
        .await;

        assert_eq!(enriched.len(), 10);
        let urls: Vec<&str> = enriched.iter().map(|l| l.summary.url.as_str()).collect();
        let expected: Vec<&str> = summaries.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, expected);

        for (i, listing) in enriched.iter().enumerate() {
            if i == 3 {
                let err = listing.detail.fetch_error.as_deref().unwrap();
                assert!(err.contains("timed out"), "unexpected error: {err}");
                assert!(listing.detail.approved_countries.is_empty());
            } else {
                assert!(listing.detail.fetch_error.is_none());
                assert_eq!(listing.detail.provider_name, "Acme");
                assert_eq!(listing.detail.approved_countries, vec!["United Kingdom"]);
            }
        }
        assert_eq!(pool.available(), 4);
    }

    #[tokio::test]
    async fn test_navigation_failure_recorded_and_session_discarded() {
        let provider = ScriptedProvider::with_pages([
            ("https://catalog.test/ok", detail_page("Ledgerly", "Canada")),
            (
                "https://catalog.test/broken",
                Page::Fail(RenderError::Navigation {
                    url: "https://catalog.test/broken".to_string(),
                    reason: "net::ERR_CONNECTION_RESET".to_string(),
                }),
            ),
        ]);
        let pool = SessionPool::new(provider, 1);
        let enriched = enrich_listings(
            &pool,
            &MarkerExtractor::default(),
            vec![
                ListingSummary::new("Broken", "https://catalog.test/broken"),
                ListingSummary::new("Ok", "https://catalog.test/ok"),
            ],
            &settings(1, Duration::from_secs(1)),
        )
        .await;

        assert!(enriched[0].detail.fetch_error.as_deref().unwrap().contains("ERR_CONNECTION_RESET"));
        assert_eq!(enriched[1].detail.approved_countries, vec!["Canada"]);
        assert_eq!(pool.provider().opened.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blank_page_is_recorded_as_fetch_error() {
        let provider = ScriptedProvider::with_pages([
            ("https://catalog.test/blank", Page::Markup("  \n ".to_string())),
            ("https://catalog.test/ok", detail_page("Acme", "Australia")),
        ]);
        let pool = SessionPool::new(provider, 1);
        let mut s = settings(1, Duration::from_secs(1));
        s.retry.max_retries = 1;

        let enriched = enrich_listings(
            &pool,
            &MarkerExtractor::default(),
            vec![
                ListingSummary::new("Blank", "https://catalog.test/blank"),
                ListingSummary::new("Ok", "https://catalog.test/ok"),
            ],
            &s,
        )
        .await;

        assert!(enriched[0].detail.is_failed());
        assert!(enriched[0].detail.approved_countries.is_empty());
        assert!(enriched[1].detail.fetch_error.is_none());
        assert_eq!(enriched[1].detail.approved_countries, vec!["Australia"]);
        let visits = pool.provider().visits.lock().unwrap().clone();
        assert_eq!(visits.iter().filter(|u| u.ends_with("/blank")).count(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_respected() {
        let pages: Vec<(String, Page)> = (0..6)
            .map(|i| {
                (
                    format!("https://catalog.test/slow/{i}"),
                    Page::Hang(Duration::from_millis(30), "<p>by: Acme</p>".to_string()),
                )
            })
            .collect();
        let provider = ScriptedProvider::with_pages(pages.clone());
        let pool = SessionPool::new(provider, 2);
        let summaries = pages
            .iter()
            .map(|(url, _)| ListingSummary::new("Slow", url.clone()))
            .collect();

        let enriched = enrich_listings(
            &pool,
            &MarkerExtractor::default(),
            summaries,
            &settings(2, Duration::from_secs(1)),
        )
        .await;

        assert_eq!(enriched.len(), 6);
        let opened = pool.provider().opened.load(std::sync::atomic::Ordering::SeqCst);
        assert!(opened <= 2, "opened {opened} sessions with a bound of 2");
        let distinct: HashSet<_> = pool.provider().visits.lock().unwrap().iter().cloned().collect();
        assert_eq!(distinct.len(), 6);
    }

    #[tokio::test]
    async fn test_slow_http_detail_times_out_in_isolation() {
        use crate::config::ScoutConfig;
        use crate::render::HttpProvider;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fast"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<p>by: Acme</p><p>Integration Approved Countries: Ireland</p>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>by: Late</p>")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let pool = SessionPool::new(HttpProvider::new(&ScoutConfig::default()).unwrap(), 2);
        let enriched = enrich_listings(
            &pool,
            &MarkerExtractor::default(),
            vec![
                ListingSummary::new("Slow", format!("{}/slow", server.uri())),
                ListingSummary::new("Fast", format!("{}/fast", server.uri())),
            ],
            &settings(2, Duration::from_millis(300)),
        )
        .await;

        assert!(enriched[0].detail.fetch_error.as_deref().unwrap().contains("timed out"));
        assert!(enriched[1].detail.fetch_error.is_none());
        assert_eq!(enriched[1].detail.approved_countries, vec!["Ireland"]);
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_output() {
        let pool = SessionPool::new(ScriptedProvider::default(), 2);
        let enriched = enrich_listings(
            &pool,
            &MarkerExtractor::default(),
            Vec::new(),
            &settings(2, Duration::from_secs(1)),
        )
        .await;
        assert!(enriched.is_empty());
    }
}
