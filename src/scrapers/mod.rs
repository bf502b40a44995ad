//! Catalog page scrapers.
//!
//! Scraping happens in two phases, mirroring how the catalog is browsed:
//!
//! 1. **Indexing** ([`index`]): parse the fully loaded index page into
//!    deduplicated [`ListingSummary`](crate::models::ListingSummary) records.
//! 2. **Detail extraction** ([`detail`]): derive provider, approved countries
//!    and body text from a listing's detail page.
//!
//! Both phases are pure functions of markup. The catalog-specific rules (the
//! listing url pattern and the text markers) live behind [`TextExtractor`]
//! and [`ListingExtractor`], so a markup change means swapping an extractor,
//! not touching the pipeline.

pub mod detail;
pub mod index;

pub use detail::{MarkerExtractor, TextExtractor};
pub use index::ListingExtractor;
