//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into the per-boundary enums below;
//! `DomainError` wraps them so the orchestrator knows which stage failed.

use crate::domain::Stage;
use thiserror::Error;

/// Feed fetcher failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by feed API")]
    RateLimited,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("feed API rejected request: {0}")]
    Rejected(String),

    #[error("invalid feed response: {0}")]
    InvalidResponse(String),
}

/// Content generator failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("AI quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("AI API rejected request: {0}")]
    Rejected(String),
}

/// Publisher failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("rate limited by platform")]
    RateLimited,

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request never reached the platform; safe to send again.
    #[error("could not connect to platform: {0}")]
    Connect(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("platform rejected post: {0}")]
    Rejected(String),
}

/// Media handler failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("media download rejected: {0}")]
    Rejected(String),

    #[error("media I/O error: {0}")]
    Io(String),
}

/// Errors worth an immediate retry at the adapter boundary.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Timeout)
    }
}

impl Transient for GenerateError {
    fn is_transient(&self) -> bool {
        matches!(self, GenerateError::Network(_) | GenerateError::Timeout)
    }
}

impl Transient for PublishError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            PublishError::Connect(_) | PublishError::Network(_) | PublishError::Timeout
        )
    }
}

impl Transient for MediaError {
    fn is_transient(&self) -> bool {
        matches!(self, MediaError::Network(_) | MediaError::Timeout)
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("generation failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("media failed: {0}")]
    Media(#[from] MediaError),

    #[error("state error: {0}")]
    State(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DomainError {
    /// Pipeline stage an external failure belongs to.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DomainError::Fetch(_) => Some(Stage::Fetch),
            DomainError::Generate(_) => Some(Stage::Generate),
            DomainError::Publish(_) => Some(Stage::Publish),
            DomainError::Media(_) => Some(Stage::Media),
            _ => None,
        }
    }

    /// Process exit code for the CLI: 2 for bad input/config, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            DomainError::Validation(_) | DomainError::Config(_) => 2,
            _ => 1,
        }
    }
}
