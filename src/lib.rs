pub mod config;
pub mod error;
pub mod github;
pub mod metrics;
pub mod overview;
pub mod pagination;
pub mod querier;
pub mod stat;
pub mod timex;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use config::{parse_repo_list, AppConfig, RepoId};
use error::StatError;
use github::RepoSource;
use metrics::RepoOverview;
use querier::StatsQuerier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Query string of the comparison endpoint, e.g. `?repos=golang/go,rust-lang/rust`.
#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub repos: String,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service for querying repository statistics.
    pub querier: StatsQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state against the GitHub API.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let querier = StatsQuerier::new(&config)?;
        Ok(Self { querier, config })
    }

    /// Initializes the application state over a custom data source.
    pub fn with_source(config: AppConfig, source: Arc<dyn RepoSource>) -> Self {
        let querier = StatsQuerier::with_source(&config, source);
        Self { querier, config }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/compare", get(compare_repos))
        .route("/api/repos/{owner}/{repo}/stats", get(get_repo_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "ghcompare",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn compare_repos(
    Query(params): Query<CompareParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RepoOverview>>, (StatusCode, String)> {
    let repos = parse_repo_list(&params.repos).map_err(error_response)?;
    let list = state.querier.get(repos).await.map_err(error_response)?;

    tracing::debug!(count = list.len(), "Returning comparison");
    Ok(Json(list))
}

pub async fn get_repo_stats(
    Path((owner, repo)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RepoOverview>, (StatusCode, String)> {
    let repo_id: RepoId = format!("{owner}/{repo}").parse().map_err(error_response)?;

    let overview = state
        .querier
        .get(vec![repo_id.clone()])
        .await
        .map_err(error_response)?
        .into_iter()
        .next();

    match overview {
        Some(overview) => {
            tracing::debug!(repo_id = %repo_id, "Returning statistics");
            Ok(Json(overview))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            format!("Repository Not Found: {repo_id}"),
        )),
    }
}

fn error_response(e: StatError) -> (StatusCode, String) {
    if e.is_validation() {
        return (StatusCode::BAD_REQUEST, e.to_string());
    }

    tracing::error!("Failed to collect statistics: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}
