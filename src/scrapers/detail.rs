//! Marker-based field extraction from rendered pages.
//!
//! The catalog exposes no structured data, so fields are recovered from
//! visible text anchors:
//!
//! - `by: <provider>` gives the provider name (first word after the marker)
//! - `Integration Approved Countries: A; B; C` gives the approved countries
//!
//! Markers are matched case-insensitively, first match in document order,
//! without assuming which tag carries them. A missing marker yields an empty
//! field, never an error.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::region::canonicalize_countries;
use crate::utils::collapse_whitespace;

pub const DEFAULT_PROVIDER_MARKER: &str = "by:";
pub const DEFAULT_COUNTRIES_MARKER: &str = "Integration Approved Countries:";

/// Elements whose text is never visible.
const HIDDEN_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// How many ancestors to climb looking for a marker's enclosing block.
const MAX_BLOCK_DEPTH: usize = 4;

static DEFAULT_EXTRACTOR: Lazy<MarkerExtractor> = Lazy::new(|| {
    MarkerExtractor::new(DEFAULT_PROVIDER_MARKER, DEFAULT_COUNTRIES_MARKER)
        .expect("default markers compile")
});

/// Structured fields derived from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFields {
    pub provider_name: String,
    pub approved_countries: Vec<String>,
    pub body_text: String,
}

/// Catalog-specific parsing rules for page text.
pub trait TextExtractor: Send + Sync {
    /// Extract provider, approved countries and body text from a detail page.
    fn extract_page(&self, markup: &str) -> PageFields;

    /// Provider name from the nearest block around a listing anchor.
    ///
    /// `owns` reports whether a candidate ancestor block belongs to this
    /// listing alone. The search stops at the first block that does not, so
    /// a tile without a marker never borrows a neighbouring tile's provider.
    fn provider_near(
        &self,
        anchor: ElementRef<'_>,
        owns: &dyn Fn(ElementRef<'_>) -> bool,
    ) -> Option<String>;
}

/// [`TextExtractor`] driven by two configurable text markers.
#[derive(Debug, Clone)]
pub struct MarkerExtractor {
    countries_marker: String,
    provider_re: Regex,
    countries_re: Regex,
}

impl Default for MarkerExtractor {
    fn default() -> Self {
        DEFAULT_EXTRACTOR.clone()
    }
}

impl MarkerExtractor {
    /// Build an extractor from marker texts such as `"by:"`.
    ///
    /// A trailing colon on the countries marker is optional in the page.
    pub fn new(provider_marker: &str, countries_marker: &str) -> Result<Self, regex::Error> {
        let provider_re = Regex::new(&format!(
            r"(?i)(?:^|[^\p{{L}}\p{{N}}]){}\s*(\S+)",
            regex::escape(provider_marker.trim())
        ))?;
        let countries_core = countries_marker.trim().trim_end_matches(':').trim_end();
        let countries_re = Regex::new(&format!(r"(?i){}\s*:?\s*", regex::escape(countries_core)))?;
        Ok(Self {
            countries_marker: countries_core.to_lowercase(),
            provider_re,
            countries_re,
        })
    }

    /// First word after the provider marker in `text`, trailing punctuation trimmed.
    pub fn provider_from_text(&self, text: &str) -> Option<String> {
        self.provider_re
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches([',', ';', '.', '|']).to_string())
            .filter(|p| !p.is_empty())
    }

    /// Country entries following the countries marker in `text`.
    pub fn countries_from_text(&self, text: &str) -> Option<Vec<String>> {
        let m = self.countries_re.find(text)?;
        let rest = text[m.end()..].trim();
        if rest.is_empty() {
            return None;
        }
        Some(canonicalize_countries(rest.split([';', ','])))
    }

    /// Locate the countries marker in document order and parse the smallest
    /// enclosing block that carries text after it.
    fn approved_countries(&self, document: &Html) -> Vec<String> {
        let root = document.root_element();
        let marker_node = root.descendants().find(|node| {
            node.value()
                .as_text()
                .is_some_and(|t| t.to_lowercase().contains(&self.countries_marker))
                && !node.ancestors().filter_map(ElementRef::wrap).any(is_hidden_tag)
        });
        let Some(marker_node) = marker_node else {
            debug!("Approved countries marker not found");
            return Vec::new();
        };

        marker_node
            .ancestors()
            .take(MAX_BLOCK_DEPTH)
            .filter_map(ElementRef::wrap)
            .find_map(|block| self.countries_from_text(&visible_text(block)))
            .unwrap_or_default()
    }
}

impl TextExtractor for MarkerExtractor {
    fn extract_page(&self, markup: &str) -> PageFields {
        let document = Html::parse_document(markup);
        let body_text = visible_text(document.root_element());
        let provider_name = self.provider_from_text(&body_text).unwrap_or_default();
        let approved_countries = self.approved_countries(&document);
        debug!(
            provider = %provider_name,
            countries = approved_countries.len(),
            bytes = body_text.len(),
            "Extracted page fields"
        );
        PageFields {
            provider_name,
            approved_countries,
            body_text,
        }
    }

    fn provider_near(
        &self,
        anchor: ElementRef<'_>,
        owns: &dyn Fn(ElementRef<'_>) -> bool,
    ) -> Option<String> {
        anchor
            .ancestors()
            .take(MAX_BLOCK_DEPTH)
            .filter_map(ElementRef::wrap)
            .take_while(|el| !matches!(el.value().name(), "body" | "html") && owns(*el))
            .find_map(|block| self.provider_from_text(&visible_text(block)))
    }
}

fn is_hidden_tag(element: ElementRef<'_>) -> bool {
    HIDDEN_TAGS.contains(&element.value().name())
}

/// All visible text under `element`, whitespace-collapsed to single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let parts: Vec<&str> = element
        .descendants()
        .filter(|node| !node.ancestors().filter_map(ElementRef::wrap).any(is_hidden_tag))
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .collect();
    collapse_whitespace(&parts.join(" "))
}
