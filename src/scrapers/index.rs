//! Listing discovery on the fully loaded catalog index page.
//!
//! Every anchor-like element whose target matches the listing-detail url
//! pattern becomes a [`ListingSummary`]. Relative targets are resolved
//! against the catalog origin and fragments are dropped, so the resolved
//! url is the listing's identity. Duplicates collapse onto the first
//! occurrence, keeping encounter order.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::detail::TextExtractor;
use crate::models::ListingSummary;
use crate::utils::collapse_whitespace;

/// Default pattern for catalog detail links, e.g. `/MPListing?lid=a0B3...`.
pub const DEFAULT_LISTING_PATTERN: &str = r"MPListing\?lid=";

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href], area[href], [data-href]").expect("static selector"));

/// Parses index-page markup into deduplicated listing summaries.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    base: Url,
    pattern: Regex,
}

impl ListingExtractor {
    pub fn new(base: Url, pattern: Regex) -> Self {
        Self { base, pattern }
    }

    /// Resolve a raw link target into the normalized listing url, or `None`
    /// when it is not a listing link.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || !self.pattern.is_match(href) {
            return None;
        }
        let mut url = self.base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_fragment(None);
        Some(url.to_string())
    }

    /// Extract listings in encounter order, first occurrence of a url winning.
    ///
    /// When the first anchor for a url has no usable text (an image link,
    /// say) its name is taken from the next anchor for the same url that has
    /// one.
    ///
    /// # Arguments
    ///
    /// * `markup` - Final markup of the fully loaded index page
    /// * `text` - Supplies the provider hint found around each anchor
    ///
    /// # Returns
    ///
    /// Unique listings in discovery order. An index with no listing links
    /// yields an empty vector.
    #[instrument(level = "info", skip_all, fields(base = %self.base))]
    pub fn extract(&self, markup: &str, text: &dyn TextExtractor) -> Vec<ListingSummary> {
        let document = Html::parse_document(markup);
        let mut listings: Vec<ListingSummary> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut anchors = 0usize;

        for element in document.select(&LINK_SELECTOR) {
            let Some(url) = link_target(element).and_then(|href| self.resolve(href)) else {
                continue;
            };
            anchors += 1;
            let name = anchor_name(element);
            let owns = |block: ElementRef<'_>| !self.links_elsewhere(block, &url);

            if let Some(&idx) = seen.get(&url) {
                let existing = &mut listings[idx];
                if existing.name.is_empty() && !name.is_empty() {
                    existing.name = name;
                }
                if existing.provider_hint.is_none() {
                    existing.provider_hint = text.provider_near(element, &owns);
                }
                continue;
            }

            seen.insert(url.clone(), listings.len());
            listings.push(ListingSummary {
                provider_hint: text.provider_near(element, &owns),
                ..ListingSummary::new(name, url)
            });
        }

        info!(anchors, unique = listings.len(), "Indexed catalog listings");
        debug!(urls = ?listings.iter().map(|l| l.url.as_str()).collect::<Vec<_>>(), "Listing urls");
        listings
    }

    /// Whether `block` holds a link to some listing other than `url`.
    fn links_elsewhere(&self, block: ElementRef<'_>, url: &str) -> bool {
        block
            .select(&LINK_SELECTOR)
            .filter_map(link_target)
            .filter_map(|href| self.resolve(href))
            .any(|other| other != url)
    }
}

fn link_target<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    element
        .value()
        .attr("href")
        .or_else(|| element.value().attr("data-href"))
}

/// Display name of a listing anchor: its text, then `title`, then `aria-label`.
fn anchor_name(element: ElementRef<'_>) -> String {
    let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
    if !text.is_empty() {
        return text;
    }
    ["title", "aria-label"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
