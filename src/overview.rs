//! Aggregation of per-repository statistics.
//!
//! This module fans out one task per requested repository and, inside each,
//! one sub-task per metric. Every metric that fails falls back to an empty
//! value right here, so the best-effort policy lives in one place. Only a
//! failed profile fetch drops a repository from the result.

use crate::config::RepoId;
use crate::error::{Result, StatError};
use crate::github::{Edge, RepoSource, RepositoryProfile};
use crate::metrics::{self, DetailCharts, RepoOverview};
use crate::stat::Stat;
use chrono::{DateTime, Duration, Local, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;

/// Rendering switches and the reference time for one comparison.
#[derive(Debug, Clone, Copy)]
pub struct OverviewOptions {
    /// Style trend indicators and language names with terminal colours.
    pub render_color: bool,
    /// Reference time; its zone defines where calendar days start.
    pub now: DateTime<Local>,
}

impl OverviewOptions {
    pub fn new(render_color: bool) -> Self {
        Self {
            render_color,
            now: Local::now(),
        }
    }
}

/// Raw per-repository data, gathered concurrently before any derivation.
struct Collected {
    profile: RepositoryProfile,
    open_issues: u64,
    open_pull_requests: u64,
    contributors: u64,
    month_stargazers: Vec<Edge>,
    weekly: Option<Weekly>,
}

struct Weekly {
    forks: Vec<Edge>,
    commits: Vec<Edge>,
    pulls: Vec<Edge>,
    issues: Vec<Edge>,
}

/// Rejects empty batches and batches larger than `max_repos`.
pub fn check_batch(repos: &[RepoId], max_repos: usize) -> Result<()> {
    if repos.is_empty() {
        return Err(StatError::NoRepos);
    }
    if repos.len() > max_repos {
        return Err(StatError::TooManyRepos {
            requested: repos.len(),
            max: max_repos,
        });
    }
    Ok(())
}

/// Fetches statistics for every repository concurrently.
///
/// The result follows the order of `repos`. Repositories whose profile could
/// not be fetched are left out. The weekly detail charts are only fetched
/// when exactly one repository is requested.
pub async fn overview<S>(
    source: &S,
    repos: &[RepoId],
    options: OverviewOptions,
) -> Vec<RepoOverview>
where
    S: RepoSource + ?Sized,
{
    if repos.is_empty() {
        return Vec::new();
    }

    let detailed = repos.len() == 1;
    tracing::info!(repos = repos.len(), detailed, "Collecting repository statistics");

    let fetches: Vec<_> = repos
        .iter()
        .map(|repo| async move {
            let overview = collect(source, repo, detailed, options.now)
                .await
                .map(|data| assemble(data, options));
            (repo, overview)
        })
        .collect();
    let collected: HashMap<&RepoId, RepoOverview> = stream::iter(fetches)
        .buffer_unordered(repos.len())
        .filter_map(|(repo, overview)| async move { overview.map(|o| (repo, o)) })
        .collect()
        .await;

    let list: Vec<RepoOverview> = repos
        .iter()
        .filter_map(|repo| collected.get(repo).cloned())
        .collect();

    tracing::info!(
        requested = repos.len(),
        returned = list.len(),
        "Finished collecting repository statistics"
    );
    list
}

/// Runs every metric fetch for one repository and waits for all of them.
async fn collect<S>(
    source: &S,
    repo: &RepoId,
    detailed: bool,
    now: DateTime<Local>,
) -> Option<Collected>
where
    S: RepoSource + ?Sized,
{
    let stat = Stat::new(source, repo, now.with_timezone(&Utc));

    let weekly = async {
        if !detailed {
            return None;
        }
        let (forks, commits, pulls, issues) = tokio::join!(
            stat.latest_week_forks(),
            stat.latest_week_commits(),
            stat.latest_week_pull_requests(),
            stat.latest_week_issues(),
        );
        Some(Weekly {
            forks,
            commits,
            pulls,
            issues,
        })
    };

    let (profile, open_issues, open_pull_requests, contributors, month_stargazers, weekly) = tokio::join!(
        stat.repository(),
        stat.open_issue_count(),
        stat.open_pull_request_count(),
        stat.contributor_count(),
        stat.latest_month_stargazers(),
        weekly,
    );

    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(repo = %repo, error = %e, "Dropping repository without profile");
            return None;
        }
    };

    Some(Collected {
        profile,
        open_issues: or_default(repo, "open issue count", open_issues),
        open_pull_requests: or_default(repo, "open pull request count", open_pull_requests),
        contributors: or_default(repo, "contributor count", contributors),
        month_stargazers,
        weekly,
    })
}

/// Substitutes the zero value for a failed metric.
fn or_default<T: Default>(repo: &RepoId, metric: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(repo = %repo, metric, error = %e, "Metric unavailable, using default");
        T::default()
    })
}

/// Derives the display values for one repository.
fn assemble(data: Collected, options: OverviewOptions) -> RepoOverview {
    let OverviewOptions { render_color, now } = options;
    let profile = data.profile;
    let now_utc = now.with_timezone(&Utc);

    let age = profile
        .created_at
        .map(|created| now_utc - created)
        .unwrap_or_else(Duration::zero);
    let release_count = profile.releases.total_count;

    let stars = &data.month_stargazers;
    let charts = data.weekly.map(|weekly| DetailCharts {
        star_history: metrics::monthly_series(stars, &now),
        forks: metrics::weekly_series(&weekly.forks, &now),
        commits: metrics::weekly_series(&weekly.commits, &now),
        pulls: metrics::weekly_series(&weekly.pulls, &now),
        issues: metrics::weekly_series(&weekly.issues, &now),
    });

    RepoOverview {
        full_name: profile.name_with_owner,
        homepage: profile.homepage_url.unwrap_or_default(),
        language: metrics::format_language(profile.primary_language.as_ref(), render_color),
        license: profile
            .license_info
            .map(|l| l.name)
            .unwrap_or_else(|| metrics::NOT_APPLICABLE.to_string()),
        age: metrics::format_period(Some(age)),
        star_count: format!(
            "{}({}/d)",
            profile.stargazer_count,
            metrics::per_day_average(profile.stargazer_count, age)
        ),
        latest_day_star_count: metrics::format_trend(
            metrics::latest_day_stars(stars, &now),
            render_color,
        ),
        latest_week_star_count: metrics::format_trend(
            metrics::latest_week_stars(stars, now_utc),
            render_color,
        ),
        latest_month_star_count: metrics::latest_month_stars(stars).to_string(),
        fork_count: format!(
            "{}({}/d)",
            profile.fork_count,
            metrics::per_day_average(profile.fork_count, age)
        ),
        watcher_count: profile.watchers.total_count.to_string(),
        issue: format!("{}/{}", data.open_issues, profile.issues.total_count),
        pull: format!(
            "{}/{}",
            data.open_pull_requests, profile.pull_requests.total_count
        ),
        contributor_count: data.contributors.to_string(),
        release_count: release_count.to_string(),
        avg_release_period: metrics::format_period(metrics::average_release_period(
            age,
            release_count,
        )),
        latest_release_at: metrics::format_duration(
            profile.latest_release.and_then(|r| r.published_at),
            &now,
        ),
        last_pushed_at: metrics::format_duration(profile.pushed_at, &now),
        last_updated_at: metrics::format_duration(profile.updated_at, &now),
        charts,
    }
}
