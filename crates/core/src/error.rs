//! Error types shared by every crate in the workspace.

use std::time::Duration;

use thiserror::Error;

/// A collaborator (market data or notification sink) could not answer.
///
/// Always transient from the engine's point of view: the next scheduled
/// poll is the retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Call exceeded its time budget.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure or non-success status.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source answered, but with something that is not a usable price.
    #[error("bad quote: {0}")]
    BadQuote(String),
}

impl FetchError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn bad_quote(message: impl Into<String>) -> Self {
        Self::BadQuote(message.into())
    }
}

/// Configuration could not be loaded or breaks an invariant.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
