//! Derived metrics over already-fetched repository data.
//!
//! Everything in this module is pure: callers pass the reference time in,
//! which keeps day boundaries and relative times deterministic under test.

use crate::github::{Edge, Language};
use crate::timex;
use chrono::{DateTime, Duration, TimeZone, Utc};
use console::style;
use serde::Serialize;
use std::fmt;

/// Placeholder for values that do not apply to a repository.
pub const NOT_APPLICABLE: &str = "N/A";

const LABEL_LAYOUT: &str = "%m-%d";
const DAYS_PER_MONTH: i64 = 30;
const DAYS_PER_YEAR: i64 = 365;

/// The fully assembled statistics for one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoOverview {
    pub full_name: String,
    pub homepage: String,
    pub language: String,
    pub license: String,
    pub age: String,
    pub star_count: String,
    pub latest_day_star_count: String,
    pub latest_week_star_count: String,
    pub latest_month_star_count: String,
    pub fork_count: String,
    pub watcher_count: String,
    pub issue: String,
    pub pull: String,
    pub contributor_count: String,
    pub release_count: String,
    pub avg_release_period: String,
    pub latest_release_at: String,
    pub last_pushed_at: String,
    pub last_updated_at: String,
    /// Only present when a single repository was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<DetailCharts>,
}

/// Day-bucketed activity series rendered in the single-repository view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailCharts {
    pub star_history: ChartSeries,
    pub forks: ChartSeries,
    pub commits: ChartSeries,
    pub pulls: ChartSeries,
    pub issues: ChartSeries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: u64,
}

pub type ChartSeries = Vec<ChartPoint>;

/// A window count and its signed difference to the preceding window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Trend {
    pub count: usize,
    pub delta: i64,
}

impl Trend {
    fn between(latest: usize, previous: usize) -> Self {
        Self {
            count: latest,
            delta: latest as i64 - previous as i64,
        }
    }
}

/// Stars since local midnight compared with the calendar day before.
///
/// `now` carries the time zone whose midnight splits the two days.
pub fn latest_day_stars<Tz: TimeZone>(edges: &[Edge], now: &DateTime<Tz>) -> Trend {
    let today = timex::truncate(now);
    let yesterday = timex::truncate(&(today.clone() - Duration::hours(12)));
    let today = today.with_timezone(&Utc);
    let yesterday = yesterday.with_timezone(&Utc);

    let latest = edges.iter().filter(|e| e.occurred_at >= today).count();
    let previous = edges
        .iter()
        .filter(|e| e.occurred_at >= yesterday && e.occurred_at < today)
        .count();

    Trend::between(latest, previous)
}

/// Stars in the last seven days compared with the seven days before.
pub fn latest_week_stars(edges: &[Edge], now: DateTime<Utc>) -> Trend {
    let latest_start = now - Duration::days(7);
    let previous_start = latest_start - Duration::days(7);

    let latest = edges.iter().filter(|e| e.occurred_at > latest_start).count();
    let previous = edges
        .iter()
        .filter(|e| e.occurred_at > previous_start && e.occurred_at <= latest_start)
        .count();

    Trend::between(latest, previous)
}

/// The month-long stargazer list is already bounded by its fetch deadline.
pub fn latest_month_stars(edges: &[Edge]) -> usize {
    edges.len()
}

/// Integer average of `total` per day of `age`.
///
/// Repositories at most one day old report the raw total.
pub fn per_day_average(total: u64, age: Duration) -> u64 {
    match age.num_days() {
        days if days > 1 => total / days as u64,
        _ => total,
    }
}

/// Mean time between releases, if there has been any release.
pub fn average_release_period(age: Duration, release_count: u64) -> Option<Duration> {
    if release_count == 0 {
        return None;
    }
    let count = i32::try_from(release_count).unwrap_or(i32::MAX);
    Some(age / count)
}

/// Renders a period in whole days.
pub fn format_period(period: Option<Duration>) -> String {
    match period {
        Some(d) if d > Duration::zero() => format!("{} days", d.num_days()),
        _ => NOT_APPLICABLE.to_string(),
    }
}

/// Renders how long ago `at` was, coarsening with magnitude.
///
/// Anything a year or older is shown as a calendar date in `now`'s time zone.
pub fn format_duration<Tz>(at: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let Some(at) = at else {
        return NOT_APPLICABLE.to_string();
    };

    let elapsed = (now.with_timezone(&Utc) - at).max(Duration::zero());
    let days = elapsed.num_days();

    if elapsed.num_seconds() < 60 {
        format!("{} second(s) ago", elapsed.num_seconds())
    } else if elapsed.num_hours() < 1 {
        format!("{} minute(s) ago", elapsed.num_minutes())
    } else if days < 1 {
        format!("{} hour(s) ago", elapsed.num_hours())
    } else if days < DAYS_PER_MONTH {
        format!("{days} day(s) ago")
    } else if days < DAYS_PER_YEAR {
        format!("{} month(s) ago", days / DAYS_PER_MONTH)
    } else {
        at.with_timezone(&now.timezone())
            .format("%Y-%m-%d")
            .to_string()
    }
}

/// Renders a window count with an indicator for the direction of its trend.
pub fn format_trend(trend: Trend, render_color: bool) -> String {
    let indicator = match (trend.delta.signum(), render_color) {
        (0, _) => return trend.count.to_string(),
        (1, false) => "▲".to_string(),
        (_, false) => "▼".to_string(),
        (1, true) => style("(up)")
            .white()
            .bright()
            .on_green()
            .on_bright()
            .force_styling(true)
            .to_string(),
        (_, true) => style("(down)")
            .white()
            .bright()
            .on_red()
            .on_bright()
            .force_styling(true)
            .to_string(),
    };
    format!("{} {}", trend.count, indicator)
}

/// Renders the primary language, tinted with its GitHub colour when styling is on.
pub fn format_language(language: Option<&Language>, render_color: bool) -> String {
    let Some(language) = language else {
        return NOT_APPLICABLE.to_string();
    };

    match language.color.as_deref().and_then(ansi256_from_hex) {
        Some(color) if render_color => style(&language.name)
            .color256(color)
            .force_styling(true)
            .to_string(),
        _ => language.name.clone(),
    }
}

/// Maps a `#rrggbb` colour onto the 6x6x6 cube of the 256-colour palette.
fn ansi256_from_hex(hex: &str) -> Option<u8> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| -> Option<u8> {
        let value = u8::from_str_radix(&hex[i..i + 2], 16).ok()?;
        Some(((u16::from(value) * 5 + 127) / 255) as u8)
    };
    Some(16 + 36 * channel(0)? + 6 * channel(2)? + channel(4)?)
}

/// Counts edges per calendar day, one point per entry of `days`.
///
/// Each bucket runs up to the next day's start, so buckets are disjoint and
/// cover days of any length; the final bucket spans 24 hours.
pub fn day_series<Tz>(edges: &[Edge], days: &[DateTime<Tz>]) -> ChartSeries
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    days.iter()
        .enumerate()
        .map(|(i, day)| {
            let start = day.with_timezone(&Utc);
            let end = days
                .get(i + 1)
                .map(|next| next.with_timezone(&Utc))
                .unwrap_or_else(|| start + Duration::days(1));

            let value = edges
                .iter()
                .filter(|e| e.occurred_at >= start && e.occurred_at < end)
                .count() as u64;

            ChartPoint {
                label: day.format(LABEL_LAYOUT).to_string(),
                value,
            }
        })
        .collect()
}

/// Day series over the seven days up to `now`, both ends inclusive.
pub fn weekly_series<Tz>(edges: &[Edge], now: &DateTime<Tz>) -> ChartSeries
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let days = timex::all_days(&(now.clone() - Duration::days(7)), now);
    day_series(edges, &days)
}

/// Day series over the thirty days up to `now`, both ends inclusive.
pub fn monthly_series<Tz>(edges: &[Edge], now: &DateTime<Tz>) -> ChartSeries
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let days = timex::all_days(&(now.clone() - Duration::days(DAYS_PER_MONTH)), now);
    day_series(edges, &days)
}
