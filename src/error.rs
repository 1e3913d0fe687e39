//! Error types shared by the fetchers, the orchestrator and the HTTP layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatError>;

/// Errors that can occur while collecting repository statistics.
///
/// Only the validation and credential variants are ever surfaced by the
/// orchestrator. Transport variants are recovered per metric.
#[derive(Debug, Error)]
pub enum StatError {
    #[error("invalid github repo name: {0}")]
    InvalidRepo(String),

    #[error("no repositories requested")]
    NoRepos,

    #[error("too many repositories requested: {requested} (max {max})")]
    TooManyRepos { requested: usize, max: usize },

    #[error("missing access token")]
    MissingToken,

    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),

    #[error("repository not found: {0}")]
    NotFound(String),
}

impl StatError {
    /// Whether the error was caused by caller input rather than the remote API.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StatError::InvalidRepo(_) | StatError::NoRepos | StatError::TooManyRepos { .. }
        )
    }
}
