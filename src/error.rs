//! Typed errors for the crawl pipeline and its rendering providers.
//!
//! Only [`ScoutError::Load`] aborts a query. Detail-page failures are
//! [`RenderError`]s that the enricher converts into a listing's
//! `fetch_error` text; missing markers and page convergence are not errors
//! at all.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// The catalog index page never became navigable or ready.
    #[error("catalog index {url} failed to load: {source}")]
    Load {
        url: String,
        #[source]
        source: RenderError,
    },

    /// The query carries nothing to search for.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// Configuration file or values are unusable.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ScoutError {
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}

/// Failures reported by a rendering or fetch provider.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {timeout:?} loading {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("element `{selector}` never appeared")]
    ElementMissing { selector: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("no page loaded in session")]
    NoPage,

    #[error("session pool closed")]
    PoolClosed,

    #[error("browser error: {0}")]
    Browser(String),
}

impl RenderError {
    /// Whether another attempt at the same page could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Navigation { .. } | Self::Timeout { .. } | Self::NoPage | Self::Browser(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::ElementMissing { .. } | Self::Script(_) | Self::PoolClosed => false,
        }
    }
}
