//! Access to the GitHub API.
//!
//! `RepoSource` is the capability the rest of the crate consumes: a profile
//! query, cursor-paginated connection pages, total counts and two REST page
//! listings. `GitHubClient` implements it on top of octocrab, using GraphQL
//! where GitHub exposes cursors and REST where only page numbers exist.

use crate::config::RepoId;
use crate::error::{Result, StatError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Largest page GitHub serves for connections and REST listings.
pub const PAGE_SIZE: u32 = 100;

/// Point-in-time snapshot of a repository's aggregate facts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryProfile {
    pub name_with_owner: String,
    pub created_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub stargazer_count: u64,
    pub fork_count: u64,
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub watchers: TotalCount,
    pub primary_language: Option<Language>,
    pub license_info: Option<License>,
    #[serde(default)]
    pub issues: TotalCount,
    #[serde(default)]
    pub pull_requests: TotalCount,
    #[serde(default)]
    pub releases: TotalCount,
    pub latest_release: Option<Release>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Language {
    pub name: String,
    /// Hex display colour, e.g. `#dea584`.
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct License {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub published_at: Option<DateTime<Utc>>,
}

/// A single item of a paginated listing, reduced to when it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Opaque position marker used to resume the walk after this edge.
    pub cursor: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Stargazers,
    Forks,
    PullRequests,
    Issues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKind {
    Issues,
    PullRequests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFilter {
    Open,
    All,
}

/// Variables for one page of a cursor-paginated connection.
///
/// Connections are always ordered newest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionQuery {
    pub kind: ConnectionKind,
    pub after: Option<String>,
    pub page_size: u32,
    pub states: StateFilter,
}

impl ConnectionQuery {
    pub fn new(kind: ConnectionKind) -> Self {
        Self {
            kind,
            after: None,
            page_size: PAGE_SIZE,
            states: StateFilter::All,
        }
    }

    pub fn after(&self, cursor: Option<String>) -> Self {
        Self {
            after: cursor,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionPage {
    pub edges: Vec<Edge>,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContributorPage {
    /// Number of contributors on this page.
    pub items: usize,
    /// Number of the last page, when GitHub sent a `last` link.
    pub last_page: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPage {
    pub edges: Vec<Edge>,
    /// Number of the last page, when GitHub sent a `last` link.
    pub last_page: Option<u32>,
}

/// The remote repository-data provider.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn fetch_repository_profile(&self, repo: &RepoId) -> Result<RepositoryProfile>;

    async fn fetch_connection_page(
        &self,
        repo: &RepoId,
        query: &ConnectionQuery,
    ) -> Result<ConnectionPage>;

    async fn fetch_total_count(
        &self,
        repo: &RepoId,
        kind: CountKind,
        states: StateFilter,
    ) -> Result<u64>;

    async fn list_contributors(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<ContributorPage>;

    async fn list_commits(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<CommitPage>;
}

const PROFILE_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    nameWithOwner
    createdAt
    pushedAt
    updatedAt
    stargazerCount
    forkCount
    homepageUrl
    watchers { totalCount }
    primaryLanguage { name color }
    licenseInfo { name }
    issues(states: [OPEN, CLOSED]) { totalCount }
    pullRequests(states: [OPEN, CLOSED, MERGED]) { totalCount }
    releases { totalCount }
    latestRelease { publishedAt }
  }
}
"#;

/// Builds the GraphQL document for one connection page.
///
/// The connection is aliased to `connection` so every kind deserializes
/// through the same response shape.
fn connection_document(query: &ConnectionQuery) -> String {
    let (field, order, edge) = match query.kind {
        ConnectionKind::Stargazers => ("stargazers", "STARRED_AT", "cursor starredAt"),
        ConnectionKind::Forks => ("forks", "CREATED_AT", "cursor node { createdAt }"),
        ConnectionKind::PullRequests => ("pullRequests", "CREATED_AT", "cursor node { createdAt }"),
        ConnectionKind::Issues => ("issues", "CREATED_AT", "cursor node { createdAt }"),
    };
    let states = match query.kind {
        ConnectionKind::PullRequests => {
            format!(", states: {}", state_literal(CountKind::PullRequests, query.states))
        }
        ConnectionKind::Issues => format!(", states: {}", state_literal(CountKind::Issues, query.states)),
        ConnectionKind::Stargazers | ConnectionKind::Forks => String::new(),
    };

    format!(
        "query($owner: String!, $name: String!, $first: Int!, $after: String) {{ \
           repository(owner: $owner, name: $name) {{ \
             connection: {field}(first: $first, after: $after, \
               orderBy: {{field: {order}, direction: DESC}}{states}) {{ \
               pageInfo {{ hasNextPage endCursor }} \
               edges {{ {edge} }} \
             }} \
           }} \
         }}"
    )
}

fn count_document(kind: CountKind, states: StateFilter) -> String {
    let field = match kind {
        CountKind::Issues => "issues",
        CountKind::PullRequests => "pullRequests",
    };
    format!(
        "query($owner: String!, $name: String!) {{ \
           repository(owner: $owner, name: $name) {{ \
             connection: {field}(states: {}) {{ totalCount }} \
           }} \
         }}",
        state_literal(kind, states)
    )
}

fn state_literal(kind: CountKind, states: StateFilter) -> &'static str {
    match (kind, states) {
        (_, StateFilter::Open) => "[OPEN]",
        (CountKind::Issues, StateFilter::All) => "[OPEN, CLOSED]",
        (CountKind::PullRequests, StateFilter::All) => "[OPEN, CLOSED, MERGED]",
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlMessage>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ConnectionData<T> {
    connection: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnection {
    page_info: RawPageInfo,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEdge {
    cursor: String,
    starred_at: Option<DateTime<Utc>>,
    node: Option<RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    created_at: DateTime<Utc>,
}

impl RawEdge {
    fn into_edge(self) -> Option<Edge> {
        let occurred_at = self.starred_at.or(self.node.map(|n| n.created_at))?;
        Some(Edge {
            cursor: self.cursor,
            occurred_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    commit: RawCommitDetail,
}

#[derive(Debug, Deserialize)]
struct RawCommitDetail {
    author: Option<RawSignature>,
}

#[derive(Debug, Deserialize)]
struct RawSignature {
    date: Option<DateTime<Utc>>,
}

/// Contributor listing parameters; anonymous committers are always counted.
#[derive(Serialize)]
struct ContributorParams {
    anon: bool,
    per_page: u32,
    page: u32,
}

impl ContributorParams {
    fn new(page: u32, per_page: u32) -> Self {
        Self {
            anon: true,
            per_page,
            page,
        }
    }
}

#[derive(Serialize)]
struct CommitParams {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    per_page: u32,
    page: u32,
}

/// Unwraps a GraphQL envelope, mapping `errors` and a `null` repository to errors.
fn into_repository<T>(repo: &RepoId, response: GraphQlResponse<RepositoryData<T>>) -> Result<T> {
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let message = errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(StatError::GraphQl(message));
    }

    response
        .data
        .and_then(|d| d.repository)
        .ok_or_else(|| StatError::NotFound(repo.to_string()))
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.to_string())
            .build()?;

        Ok(Self { octocrab })
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        repo: &RepoId,
        document: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let payload = json!({ "query": document, "variables": variables });
        let response: GraphQlResponse<RepositoryData<T>> = self.octocrab.graphql(&payload).await?;
        into_repository(repo, response)
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn fetch_repository_profile(&self, repo: &RepoId) -> Result<RepositoryProfile> {
        tracing::debug!(repo = %repo, "Fetching repository profile");
        self.graphql(
            repo,
            PROFILE_QUERY,
            json!({ "owner": repo.owner, "name": repo.repo }),
        )
        .await
    }

    async fn fetch_connection_page(
        &self,
        repo: &RepoId,
        query: &ConnectionQuery,
    ) -> Result<ConnectionPage> {
        tracing::debug!(repo = %repo, kind = ?query.kind, after = ?query.after, "Fetching connection page");
        let data: ConnectionData<RawConnection> = self
            .graphql(
                repo,
                &connection_document(query),
                json!({
                    "owner": repo.owner,
                    "name": repo.repo,
                    "first": query.page_size,
                    "after": query.after,
                }),
            )
            .await?;

        Ok(ConnectionPage {
            has_next_page: data.connection.page_info.has_next_page,
            edges: data
                .connection
                .edges
                .into_iter()
                .filter_map(RawEdge::into_edge)
                .collect(),
        })
    }

    async fn fetch_total_count(
        &self,
        repo: &RepoId,
        kind: CountKind,
        states: StateFilter,
    ) -> Result<u64> {
        tracing::debug!(repo = %repo, ?kind, ?states, "Fetching total count");
        let data: ConnectionData<TotalCount> = self
            .graphql(
                repo,
                &count_document(kind, states),
                json!({ "owner": repo.owner, "name": repo.repo }),
            )
            .await?;

        Ok(data.connection.total_count)
    }

    async fn list_contributors(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<ContributorPage> {
        tracing::debug!(repo = %repo, page, "Listing contributors");
        let route = format!("/repos/{}/{}/contributors", repo.owner, repo.repo);
        let result: Page<serde_json::Value> = self
            .octocrab
            .get(route, Some(&ContributorParams::new(page, per_page)))
            .await?;

        Ok(ContributorPage {
            items: result.items.len(),
            last_page: result.number_of_pages(),
        })
    }

    async fn list_commits(
        &self,
        repo: &RepoId,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<CommitPage> {
        tracing::debug!(repo = %repo, page, "Listing commits");
        let route = format!("/repos/{}/{}/commits", repo.owner, repo.repo);
        let params = CommitParams {
            since,
            until,
            per_page,
            page,
        };
        let result: Page<RawCommit> = self.octocrab.get(route, Some(&params)).await?;
        let last_page = result.number_of_pages();

        Ok(CommitPage {
            edges: result
                .items
                .into_iter()
                .filter_map(|c| {
                    let occurred_at = c.commit.author.and_then(|a| a.date)?;
                    Some(Edge {
                        cursor: c.sha,
                        occurred_at,
                    })
                })
                .collect(),
            last_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoId {
        RepoId {
            owner: "golang".to_string(),
            repo: "go".to_string(),
        }
    }

    #[test]
    fn test_connection_document_orders_newest_first() {
        let doc = connection_document(&ConnectionQuery::new(ConnectionKind::Stargazers));
        assert!(doc.contains("connection: stargazers("));
        assert!(doc.contains("field: STARRED_AT, direction: DESC"));
        assert!(doc.contains("starredAt"));
        assert!(!doc.contains("states:"));

        let doc = connection_document(&ConnectionQuery::new(ConnectionKind::PullRequests));
        assert!(doc.contains("connection: pullRequests("));
        assert!(doc.contains("field: CREATED_AT, direction: DESC"));
        assert!(doc.contains("states: [OPEN, CLOSED, MERGED]"));

        let doc = connection_document(&ConnectionQuery::new(ConnectionKind::Issues));
        assert!(doc.contains("states: [OPEN, CLOSED]"));
    }

    #[test]
    fn test_count_document_states() {
        assert!(count_document(CountKind::Issues, StateFilter::Open).contains("issues(states: [OPEN])"));
        assert!(count_document(CountKind::PullRequests, StateFilter::All)
            .contains("pullRequests(states: [OPEN, CLOSED, MERGED])"));
    }

    #[test]
    fn test_parse_profile_response() {
        let body = serde_json::json!({
            "data": {
                "repository": {
                    "nameWithOwner": "golang/go",
                    "createdAt": "2014-08-19T04:33:40Z",
                    "pushedAt": "2024-01-09T10:00:00Z",
                    "updatedAt": "2024-01-10T10:00:00Z",
                    "stargazerCount": 120000,
                    "forkCount": 17000,
                    "homepageUrl": "https://go.dev",
                    "watchers": { "totalCount": 3400 },
                    "primaryLanguage": { "name": "Go", "color": "#00ADD8" },
                    "licenseInfo": { "name": "BSD 3-Clause \"New\" or \"Revised\" License" },
                    "issues": { "totalCount": 50000 },
                    "pullRequests": { "totalCount": 6000 },
                    "releases": { "totalCount": 0 },
                    "latestRelease": null
                }
            }
        });

        let response: GraphQlResponse<RepositoryData<RepositoryProfile>> =
            serde_json::from_value(body).unwrap();
        let profile = into_repository(&repo(), response).unwrap();

        assert_eq!(profile.name_with_owner, "golang/go");
        assert_eq!(profile.stargazer_count, 120000);
        assert_eq!(profile.watchers.total_count, 3400);
        assert_eq!(profile.primary_language.unwrap().color.as_deref(), Some("#00ADD8"));
        assert_eq!(profile.releases.total_count, 0);
        assert!(profile.latest_release.is_none());
    }

    #[test]
    fn test_graphql_errors_and_missing_repository() {
        let body = serde_json::json!({
            "data": { "repository": null },
            "errors": [{ "message": "Could not resolve to a Repository" }]
        });
        let response: GraphQlResponse<RepositoryData<RepositoryProfile>> =
            serde_json::from_value(body).unwrap();
        assert!(matches!(
            into_repository(&repo(), response),
            Err(StatError::GraphQl(ref m)) if m.contains("Could not resolve")
        ));

        let body = serde_json::json!({ "data": { "repository": null } });
        let response: GraphQlResponse<RepositoryData<RepositoryProfile>> =
            serde_json::from_value(body).unwrap();
        assert!(matches!(
            into_repository(&repo(), response),
            Err(StatError::NotFound(ref r)) if r == "golang/go"
        ));
    }

    #[test]
    fn test_parse_connection_edges() {
        let body = serde_json::json!({
            "connection": {
                "pageInfo": { "hasNextPage": true, "endCursor": "c2" },
                "edges": [
                    { "cursor": "c1", "starredAt": "2024-01-10T10:00:00Z" },
                    { "cursor": "c2", "node": { "createdAt": "2024-01-09T10:00:00Z" } },
                    { "cursor": "c3" }
                ]
            }
        });
        let data: ConnectionData<RawConnection> = serde_json::from_value(body).unwrap();
        assert!(data.connection.page_info.has_next_page);

        let edges: Vec<Edge> = data
            .connection
            .edges
            .into_iter()
            .filter_map(RawEdge::into_edge)
            .collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].cursor, "c1");
        assert_eq!(edges[1].cursor, "c2");
    }

    #[test]
    fn test_contributor_params_include_anonymous() {
        let params = serde_json::to_value(ContributorParams::new(1, 1)).unwrap();
        assert_eq!(params["anon"], true);
        assert_eq!(params["per_page"], 1);
        assert_eq!(params["page"], 1);
    }
}
