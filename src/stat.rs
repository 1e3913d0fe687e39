//! Per-metric fetchers for a single repository.
//!
//! Single-query metrics return `Result` and leave the fallback to the caller.
//! Windowed listings walk pages until their deadline and keep whatever was
//! collected when a request fails.

use crate::config::RepoId;
use crate::error::Result;
use crate::github::{
    ConnectionKind, ConnectionQuery, CountKind, Edge, RepoSource, RepositoryProfile, StateFilter,
    PAGE_SIZE,
};
use crate::pagination;
use chrono::{DateTime, Duration, Utc};

const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

/// Metric fetchers bound to one repository and one reference time.
pub struct Stat<'a, S: ?Sized> {
    source: &'a S,
    repo: &'a RepoId,
    now: DateTime<Utc>,
}

impl<'a, S> Stat<'a, S>
where
    S: RepoSource + ?Sized,
{
    pub fn new(source: &'a S, repo: &'a RepoId, now: DateTime<Utc>) -> Self {
        Self { source, repo, now }
    }

    pub async fn repository(&self) -> Result<RepositoryProfile> {
        self.source.fetch_repository_profile(self.repo).await
    }

    pub async fn open_issue_count(&self) -> Result<u64> {
        self.source
            .fetch_total_count(self.repo, CountKind::Issues, StateFilter::Open)
            .await
    }

    pub async fn open_pull_request_count(&self) -> Result<u64> {
        self.source
            .fetch_total_count(self.repo, CountKind::PullRequests, StateFilter::Open)
            .await
    }

    /// Number of contributors, read off the page count of a one-per-page listing.
    pub async fn contributor_count(&self) -> Result<u64> {
        let page = self.source.list_contributors(self.repo, 1, 1).await?;
        Ok(page
            .last_page
            .map(u64::from)
            .unwrap_or(page.items as u64))
    }

    pub async fn latest_month_stargazers(&self) -> Vec<Edge> {
        self.walk(ConnectionKind::Stargazers, Duration::days(MONTH_DAYS))
            .await
    }

    pub async fn latest_week_forks(&self) -> Vec<Edge> {
        self.walk(ConnectionKind::Forks, Duration::days(WEEK_DAYS))
            .await
    }

    pub async fn latest_week_pull_requests(&self) -> Vec<Edge> {
        self.walk(ConnectionKind::PullRequests, Duration::days(WEEK_DAYS))
            .await
    }

    pub async fn latest_week_issues(&self) -> Vec<Edge> {
        self.walk(ConnectionKind::Issues, Duration::days(WEEK_DAYS))
            .await
    }

    /// Commits authored in the last week, walked by REST page number.
    pub async fn latest_week_commits(&self) -> Vec<Edge> {
        let since = self.now - Duration::days(WEEK_DAYS);
        let mut commits = Vec::new();
        let mut page = 1;

        loop {
            let result = self
                .source
                .list_commits(self.repo, since, self.now, page, PAGE_SIZE)
                .await;

            match result {
                Ok(listing) => {
                    let empty = listing.edges.is_empty();
                    commits.extend(listing.edges);
                    if empty || page >= listing.last_page.unwrap_or(page) {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    tracing::warn!(repo = %self.repo, page, error = %e, "Commit listing aborted");
                    break;
                }
            }
        }

        commits
    }

    async fn walk(&self, kind: ConnectionKind, window: Duration) -> Vec<Edge> {
        let deadline = self.now - window;
        let query = ConnectionQuery::new(kind);
        let edges =
            pagination::collect_until(self.source, self.repo, &query, |e| e.occurred_at < deadline)
                .await;

        tracing::debug!(repo = %self.repo, ?kind, count = edges.len(), "Collected connection edges");
        edges
    }
}
