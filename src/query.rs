//! Turning caller input into a normalized [`Query`].
//!
//! Two entry points:
//!
//! - [`from_params`]: comma-separated `keywords`, optional `region` and
//!   `match` policy, as sent to the search endpoint
//! - [`from_question`]: a free-text question such as
//!   "What MPP is good for AP Automation in the UK?"
//!
//! Both refuse to produce a query without keywords, since an empty keyword
//! set would match the whole catalog.

use tracing::debug;

use crate::error::ScoutError;
use crate::models::{MatchPolicy, Query, SearchScope};
use crate::region;

/// Words that carry no search meaning in marketplace questions.
const NOISE_WORDS: &[&str] = &[
    "what", "which", "is", "for", "good", "fit", "in", "the", "solution", "partner", "app",
    "application", "marketplace", "mpp", "recommend", "best",
];

/// Build a query from already-split keywords.
///
/// Keywords are trimmed and case-folded; blanks and repeats are dropped.
pub fn build(
    keywords: impl IntoIterator<Item = impl AsRef<str>>,
    region: Option<String>,
    policy: MatchPolicy,
    scope: SearchScope,
) -> Result<Query, ScoutError> {
    let mut cleaned: Vec<String> = Vec::new();
    for keyword in keywords {
        let folded = keyword.as_ref().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if !folded.is_empty() && !cleaned.contains(&folded) {
            cleaned.push(folded);
        }
    }
    if cleaned.is_empty() {
        return Err(ScoutError::invalid_query("at least one keyword is required"));
    }
    Ok(Query {
        keywords: cleaned,
        region,
        policy,
        scope,
    })
}

/// Structured parameters: `keywords` is comma-separated.
///
/// A region found in the alias table maps to its canonical name; any other
/// non-blank region is kept in title-cased canonical form.
pub fn from_params(
    keywords: &str,
    region: Option<&str>,
    policy: Option<&str>,
    scope: SearchScope,
) -> Result<Query, ScoutError> {
    let policy = match policy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => p.parse::<MatchPolicy>().map_err(ScoutError::invalid_query)?,
        None => MatchPolicy::default(),
    };
    let region = region
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| match region::normalize(r) {
            Some(canonical) => canonical.to_string(),
            None => region::canonicalize_country(r),
        });
    build(keywords.split(','), region, policy, scope)
}

/// Free text: strip noise words and the detected region, keep the rest as
/// one keyword phrase.
pub fn from_question(question: &str, scope: SearchScope) -> Result<Query, ScoutError> {
    let detected = region::find_alias(question);
    let lowered = question.to_lowercase();
    let alias_tokens: Vec<&str> = detected
        .map(|(alias, _)| alias.split_whitespace().collect())
        .unwrap_or_default();

    let tokens: Vec<&str> = lowered
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '&' && c != '-'))
        .map(|t| t.trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .filter(|t| !NOISE_WORDS.contains(t))
        .filter(|t| !alias_tokens.iter().any(|a| a.trim_end_matches('.') == *t))
        .collect();
    let phrase = tokens.join(" ");
    debug!(%question, %phrase, region = ?detected, "Interpreted question");

    if phrase.is_empty() {
        return Err(ScoutError::invalid_query("could not detect keywords from question"));
    }
    build(
        [phrase],
        detected.map(|(_, canonical)| canonical.to_string()),
        MatchPolicy::Any,
        scope,
    )
}
