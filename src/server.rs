//! HTTP API over the pipeline.
//!
//! | Route | Query params | Response |
//! |-------|--------------|----------|
//! | `GET /` | | `{"status":"online","message":...}` |
//! | `GET /search` | `keywords`, `region`, `match`, `scope` | array of listing records |
//! | `GET /ask` | `q`, `scope` | [`AskResponse`] |
//!
//! An unusable query is a 400; a catalog index that fails to load is a 502.
//! Both carry `{"error": "..."}`. Every request runs its own pipeline
//! execution; requests share only the session pool.

use std::sync::Arc;

use axum::extract::{Query as Params, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ScoutError;
use crate::models::{AskResponse, ListingRecord, SearchScope};
use crate::pipeline::Pipeline;
use crate::query;
use crate::render::RenderProvider;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub keywords: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "match")]
    pub policy: Option<String>,
    pub scope: Option<SearchScope>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskParams {
    pub q: Option<String>,
    pub scope: Option<SearchScope>,
}

/// Error body plus status for a failed request.
pub struct ApiError(ScoutError);

impl From<ScoutError> for ApiError {
    fn from(e: ScoutError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScoutError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            ScoutError::Load { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%status, error = %self.0, "Request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router<P: RenderProvider>(pipeline: Arc<Pipeline<P>>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/search", get(search::<P>))
        .route("/ask", get(ask::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve<P: RenderProvider>(pipeline: Arc<Pipeline<P>>, addr: &str) -> Result<(), ScoutError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        catalog = %pipeline.catalog_url(),
        sessions = pipeline.pool().capacity(),
        "Serving marketplace API"
    );
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "online",
        "message": "Marketplace scout is running. Try /search?keywords=ap%20automation&region=UK or /ask?q=...",
    }))
}

async fn search<P: RenderProvider>(
    State(pipeline): State<Arc<Pipeline<P>>>,
    Params(params): Params<SearchParams>,
) -> Result<Json<Vec<ListingRecord>>, ApiError> {
    let query = query::from_params(
        params.keywords.as_deref().unwrap_or_default(),
        params.region.as_deref(),
        params.policy.as_deref(),
        params.scope.unwrap_or(pipeline.default_scope()),
    )?;
    let result = pipeline.run(&query).await?;
    Ok(Json(result.records()))
}

async fn ask<P: RenderProvider>(
    State(pipeline): State<Arc<Pipeline<P>>>,
    Params(params): Params<AskParams>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = params.q.unwrap_or_default();
    let query = query::from_question(&question, params.scope.unwrap_or(pipeline.default_scope()))?;
    let result = pipeline.run(&query).await?;
    let results = result.records();
    Ok(Json(AskResponse {
        query: question,
        keywords_used: query.keywords,
        region_used: query.region,
        count: results.len(),
        results,
    }))
}
