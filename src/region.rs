//! Region normalization and region filtering.
//!
//! Free-text regions ("UK", "u.k.", "Great Britain") are mapped onto
//! canonical country names through a fixed alias table. Scraped approved
//! country lists are canonicalized the same way before any comparison.
//!
//! # Alias matching
//!
//! The lower-cased input is scanned for each alias in table order and the
//! first alias found wins. An occurrence only counts when it is not glued to
//! a neighbouring letter or digit, so "us" does not fire inside "business"
//! and "ca" does not fire inside "cash".

use itertools::Itertools;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::models::EnrichedListing;
use crate::utils::{collapse_whitespace, title_case};

pub const UNITED_KINGDOM: &str = "United Kingdom";
pub const UNITED_STATES: &str = "United States";
pub const CANADA: &str = "Canada";
pub const AUSTRALIA: &str = "Australia";
pub const IRELAND: &str = "Ireland";

/// Alias table in resolution order. Longer aliases precede their short codes.
static REGION_ALIASES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("united kingdom", UNITED_KINGDOM),
        ("great britain", UNITED_KINGDOM),
        ("britain", UNITED_KINGDOM),
        ("england", UNITED_KINGDOM),
        ("scotland", UNITED_KINGDOM),
        ("wales", UNITED_KINGDOM),
        ("u.k.", UNITED_KINGDOM),
        ("uk", UNITED_KINGDOM),
        ("gb", UNITED_KINGDOM),
        ("united states of america", UNITED_STATES),
        ("united states", UNITED_STATES),
        ("america", UNITED_STATES),
        ("u.s.a.", UNITED_STATES),
        ("u.s.", UNITED_STATES),
        ("usa", UNITED_STATES),
        ("us", UNITED_STATES),
        ("canada", CANADA),
        ("ca", CANADA),
        ("australia", AUSTRALIA),
        ("au", AUSTRALIA),
        ("republic of ireland", IRELAND),
        ("ireland", IRELAND),
        ("eire", IRELAND),
    ]
});

/// Map free text onto a canonical region, or `None` when nothing matches.
///
/// `None` means "no region constraint", never an error.
pub fn normalize(text: &str) -> Option<&'static str> {
    find_alias(text).map(|(_, canonical)| canonical)
}

/// The alias that [`normalize`] matched, together with its canonical name.
pub fn find_alias(text: &str) -> Option<(&'static str, &'static str)> {
    let haystack = text.to_lowercase();
    let found = REGION_ALIASES
        .iter()
        .find(|(alias, _)| contains_bounded(&haystack, alias))
        .copied();
    debug!(input = %text, matched = ?found, "Region lookup");
    found
}

/// True when `needle` occurs in `haystack` with no alphanumeric character
/// directly before or after it.
fn contains_bounded(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Canonical display form of one scraped country entry.
///
/// Exact alias hits ("UK", "USA") map to their canonical name; anything else
/// is whitespace-collapsed and title-cased.
pub fn canonicalize_country(raw: &str) -> String {
    let cleaned = collapse_whitespace(raw.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == ','));
    let lowered = cleaned.to_lowercase();
    REGION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered || alias.trim_end_matches('.') == lowered)
        .map_or_else(|| title_case(&cleaned), |(_, canonical)| (*canonical).to_string())
}

/// Canonicalize a list of scraped countries, dropping empties and repeats.
pub fn canonicalize_countries<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|c| canonicalize_country(c.as_ref()))
        .filter(|c| !c.is_empty())
        .unique()
        .collect()
}

/// Comparison key: lower-cased, punctuation dropped, whitespace collapsed.
fn comparison_key(s: &str) -> String {
    let stripped: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&stripped)
}

/// Whether a listing's approved countries admit `target`.
///
/// Failed fetches and empty country lists never pass. A country passes when
/// its comparison key equals the target's, either as written or with a
/// trailing parenthetical dropped ("United Kingdom (UK)"). A country whose
/// name merely contains the target ("Northern Ireland" for "Ireland") is a
/// different country and does not pass.
pub fn region_matches(listing: &EnrichedListing, target: &str) -> bool {
    if listing.detail.is_failed() || listing.detail.approved_countries.is_empty() {
        return false;
    }
    let target_key = comparison_key(target);
    if target_key.is_empty() {
        return false;
    }
    listing.detail.approved_countries.iter().any(|country| {
        let key = comparison_key(country);
        key == target_key || comparison_key(without_qualifier(country)) == target_key
    })
}

/// Country text before any parenthetical or bracketed qualifier.
fn without_qualifier(country: &str) -> &str {
    country.split(['(', '[']).next().unwrap_or(country)
}

/// Keep only the listings approved for `target`, preserving order.
pub fn filter_by_region(listings: Vec<EnrichedListing>, target: &str) -> Vec<EnrichedListing> {
    listings
        .into_iter()
        .filter(|l| region_matches(l, target))
        .collect()
}
