//! Service layer for querying and caching repository comparisons.
//!
//! This module implements `StatsQuerier`, which acts as the main entry point for retrieving
//! repository statistics. It handles:
//! 1. Validating the requested batch before anything is fetched.
//! 2. Checking the in-memory cache for an identical, recent batch.
//! 3. Running the aggregation pipeline when the cache is empty.

use crate::config::{AppConfig, RepoId};
use crate::error::Result;
use crate::github::{GitHubClient, RepoSource};
use crate::metrics::RepoOverview;
use crate::overview::{self, OverviewOptions};
use moka::future::Cache;
use std::sync::Arc;

#[derive(Clone)]
pub struct StatsQuerier {
    cache: Cache<Vec<RepoId>, Vec<RepoOverview>>,
    source: Arc<dyn RepoSource>,
    config: AppConfig,
}

impl StatsQuerier {
    /// Initializes a querier backed by the GitHub API.
    ///
    /// Fails with `StatError::MissingToken` when no access token is configured.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = GitHubClient::new(config.access_token()?)?;
        Ok(Self::with_source(config, Arc::new(client)))
    }

    /// Initializes a querier over any repository data source.
    pub fn with_source(config: &AppConfig, source: Arc<dyn RepoSource>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(config.cache_ttl())
            .build();

        Self {
            cache,
            source,
            config: config.clone(),
        }
    }

    /// Retrieves statistics for a batch, fetching them if not cached (read-through).
    ///
    /// Results keep the order of `repos`; repositories that could not be
    /// fetched are missing from the list.
    pub async fn get(&self, repos: Vec<RepoId>) -> Result<Vec<RepoOverview>> {
        overview::check_batch(&repos, self.config.max_repos)?;

        if let Some(list) = self.cache.get(&repos).await {
            tracing::debug!(repos = repos.len(), "Returning cached statistics");
            return Ok(list);
        }

        let options = OverviewOptions::new(self.config.render_color);
        let list = overview::overview(self.source.as_ref(), &repos, options).await;

        // An empty result is most likely a transient outage; retry next time.
        if !list.is_empty() {
            self.cache.insert(repos, list.clone()).await;
        }

        Ok(list)
    }
}
