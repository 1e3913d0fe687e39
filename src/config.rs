//! Application configuration and environment variable parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs the access token, trend styling,
//! batch limits and cache behaviour, and `RepoId`, the validated `owner/name` pair
//! every fetch is keyed by.

use crate::error::{Result, StatError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration as StdDuration;

static REPO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w-]+/[\w-]+$").expect("repository pattern is a valid regex")
});

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "golang").
    pub owner: String,
    /// The name of the repository (e.g., "go").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = StatError;

    fn from_str(s: &str) -> Result<Self> {
        if !REPO_PATTERN.is_match(s) || !s.is_ascii() {
            return Err(StatError::InvalidRepo(s.to_string()));
        }

        let (owner, repo) = s
            .split_once('/')
            .ok_or_else(|| StatError::InvalidRepo(s.to_string()))?;

        Ok(RepoId {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

/// Parses a comma-separated list of `owner/name` pairs.
///
/// Whitespace around entries is ignored. The first invalid entry fails the
/// whole list so that no fetch starts for a partially valid batch.
pub fn parse_repo_list(s: &str) -> Result<Vec<RepoId>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(RepoId::from_str)
        .collect()
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// GitHub access token used for every API call.
    pub github_access_token: Option<String>,

    /// Render trend indicators and language names as styled terminal text.
    #[serde(default)]
    pub render_color: bool,

    /// Maximum number of repositories accepted in one comparison.
    #[serde(default = "default_max_repos")]
    pub max_repos: usize,

    /// Time to live for cached comparisons in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Maximum number of comparisons to keep in the cache.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_max_repos() -> usize {
    4
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_max_capacity() -> u64 {
    100
}

fn default_port() -> u16 {
    3000
}

impl AppConfig {
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Builds a configuration with defaults for everything but the token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            github_access_token: Some(token.into()),
            render_color: false,
            max_repos: default_max_repos(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_capacity: default_cache_max_capacity(),
            port: default_port(),
        }
    }

    /// Returns the access token, failing when it is absent or blank.
    pub fn access_token(&self) -> Result<&str> {
        match self.github_access_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(StatError::MissingToken),
        }
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }
}
