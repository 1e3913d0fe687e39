use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use ghcompare::{
    config::{AppConfig, RepoId},
    create_app,
    error::{Result, StatError},
    github::{
        CommitPage, ConnectionPage, ConnectionQuery, ContributorPage, CountKind, Edge,
        RepoSource, RepositoryProfile, StateFilter, TotalCount,
    },
    AppState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

/// A GitHub stand-in that knows `golang/go` and `rust-lang/rust`.
#[derive(Default)]
struct StaticSource {
    requests: AtomicUsize,
}

#[async_trait]
impl RepoSource for StaticSource {
    async fn fetch_repository_profile(&self, repo: &RepoId) -> Result<RepositoryProfile> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match repo.to_string().as_str() {
            "golang/go" | "rust-lang/rust" => Ok(RepositoryProfile {
                name_with_owner: repo.to_string(),
                created_at: Some(Utc::now() - Duration::days(10) - Duration::hours(1)),
                stargazer_count: 100,
                fork_count: 20,
                issues: TotalCount { total_count: 8 },
                pull_requests: TotalCount { total_count: 4 },
                ..Default::default()
            }),
            _ => Err(StatError::NotFound(repo.to_string())),
        }
    }

    async fn fetch_connection_page(
        &self,
        _repo: &RepoId,
        _query: &ConnectionQuery,
    ) -> Result<ConnectionPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(ConnectionPage {
            edges: vec![Edge {
                cursor: "c1".to_string(),
                occurred_at: Utc::now() - Duration::minutes(30),
            }],
            has_next_page: false,
        })
    }

    async fn fetch_total_count(
        &self,
        _repo: &RepoId,
        kind: CountKind,
        _states: StateFilter,
    ) -> Result<u64> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(match kind {
            CountKind::Issues => 2,
            CountKind::PullRequests => 1,
        })
    }

    async fn list_contributors(
        &self,
        _repo: &RepoId,
        _page: u32,
        _per_page: u32,
    ) -> Result<ContributorPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(ContributorPage {
            items: 1,
            last_page: Some(6),
        })
    }

    async fn list_commits(
        &self,
        _repo: &RepoId,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
        _page: u32,
        _per_page: u32,
    ) -> Result<CommitPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(CommitPage::default())
    }
}

fn setup() -> (axum::Router, Arc<StaticSource>) {
    let source = Arc::new(StaticSource::default());
    let state = Arc::new(AppState::with_source(
        AppConfig::with_token("test-token"),
        source.clone(),
    ));
    (create_app(state), source)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Option<serde_json::Value>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body_bytes).ok())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, body) = get_json(app, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    let body_json = body.unwrap();
    assert_eq!(body_json["status"], "ok");
    assert_eq!(body_json["service"], "ghcompare");
}

#[tokio::test]
async fn test_compare_preserves_request_order() {
    let (app, _) = setup();

    let (status, body) = get_json(app, "/api/compare?repos=rust-lang/rust,golang/go").await;

    assert_eq!(status, StatusCode::OK);
    let list = body.unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["fullName"], "rust-lang/rust");
    assert_eq!(list[1]["fullName"], "golang/go");
    assert_eq!(list[0]["starCount"], "100(10/d)");
    assert_eq!(list[0]["issue"], "2/8");
    assert_eq!(list[0]["pull"], "1/4");
    assert_eq!(list[0]["contributorCount"], "6");
    assert!(list[0].get("charts").is_none());
}

#[tokio::test]
async fn test_compare_drops_unknown_repository() {
    let (app, _) = setup();

    let (status, body) = get_json(app, "/api/compare?repos=golang/go,nobody/nothing").await;

    assert_eq!(status, StatusCode::OK);
    let list = body.unwrap();
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["fullName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["golang/go"]);
}

#[tokio::test]
async fn test_compare_rejects_invalid_name_without_fetching() {
    let (app, source) = setup();

    let (status, _) = get_json(app, "/api/compare?repos=golang/go,not%20a%20repo!").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(source.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_compare_rejects_too_many_repositories() {
    let (app, source) = setup();

    let (status, _) = get_json(app, "/api/compare?repos=a/a,b/b,c/c,d/d,e/e").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(source.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_repo_stats_includes_charts() {
    let (app, _) = setup();

    let (status, body) = get_json(app, "/api/repos/golang/go/stats").await;

    assert_eq!(status, StatusCode::OK);
    let overview = body.unwrap();
    assert_eq!(overview["fullName"], "golang/go");
    assert_eq!(overview["charts"]["forks"].as_array().unwrap().len(), 8);
    assert_eq!(overview["charts"]["commits"].as_array().unwrap().len(), 8);
    assert_eq!(overview["charts"]["starHistory"].as_array().unwrap().len(), 31);
}

#[tokio::test]
async fn test_repo_stats_not_found() {
    let (app, _) = setup();

    let (status, _) = get_json(app, "/api/repos/nobody/nothing/stats").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_repo_overview_contract() {
    // Consumers read these camelCase field names; renaming one breaks them.
    use ghcompare::metrics::{ChartPoint, DetailCharts, RepoOverview};

    let overview = RepoOverview {
        full_name: "golang/go".to_string(),
        homepage: "https://go.dev".to_string(),
        language: "Go".to_string(),
        license: "BSD-3-Clause".to_string(),
        age: "3000 days".to_string(),
        star_count: "120000(40/d)".to_string(),
        latest_day_star_count: "30 ▲".to_string(),
        latest_week_star_count: "200".to_string(),
        latest_month_star_count: "900".to_string(),
        fork_count: "17000(5/d)".to_string(),
        watcher_count: "3400".to_string(),
        issue: "9000/50000".to_string(),
        pull: "300/6000".to_string(),
        contributor_count: "2000".to_string(),
        release_count: "0".to_string(),
        avg_release_period: "N/A".to_string(),
        latest_release_at: "N/A".to_string(),
        last_pushed_at: "2 hour(s) ago".to_string(),
        last_updated_at: "1 hour(s) ago".to_string(),
        charts: Some(DetailCharts {
            forks: vec![ChartPoint {
                label: "01-10".to_string(),
                value: 3,
            }],
            ..Default::default()
        }),
    };

    let json = serde_json::to_value(&overview).unwrap();

    assert_eq!(json["fullName"], "golang/go");
    assert_eq!(json["starCount"], "120000(40/d)");
    assert_eq!(json["latestDayStarCount"], "30 ▲");
    assert_eq!(json["latestWeekStarCount"], "200");
    assert_eq!(json["latestMonthStarCount"], "900");
    assert_eq!(json["forkCount"], "17000(5/d)");
    assert_eq!(json["watcherCount"], "3400");
    assert_eq!(json["contributorCount"], "2000");
    assert_eq!(json["releaseCount"], "0");
    assert_eq!(json["avgReleasePeriod"], "N/A");
    assert_eq!(json["latestReleaseAt"], "N/A");
    assert_eq!(json["lastPushedAt"], "2 hour(s) ago");
    assert_eq!(json["lastUpdatedAt"], "1 hour(s) ago");
    assert_eq!(json["charts"]["forks"][0]["label"], "01-10");
    assert_eq!(json["charts"]["forks"][0]["value"], 3);
    assert!(json["charts"]["starHistory"].as_array().unwrap().is_empty());
}
