//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters; tests substitute in-memory fakes.

use crate::domain::{
    DomainError, FetchError, GenerateError, MediaError, MediaRef, Mode, Post, PublishError,
    RunState, Target,
};
use std::path::PathBuf;
use std::time::Duration;

/// Feed fetcher. Reads recent posts for a handle or a search query.
#[async_trait::async_trait]
pub trait FeedPort: Send + Sync {
    /// Up to `limit` recent posts, newest first. An empty feed is `Ok(vec![])`.
    async fn fetch(&self, target: &Target, limit: usize) -> Result<Vec<Post>, FetchError>;
}

/// Content generator. One AI call per invocation.
#[async_trait::async_trait]
pub trait GeneratorPort: Send + Sync {
    /// Raw text for `mode` given a context (post text or topic). Length fitting and
    /// thread splitting are the caller's job.
    async fn generate(&self, mode: Mode, context: &str) -> Result<String, GenerateError>;
}

/// Publisher. Must keep a minimum delay between successive calls.
#[async_trait::async_trait]
pub trait PublisherPort: Send + Sync {
    /// Publish `text` and return the new post id.
    ///
    /// `in_reply_to` is the replied-to post for reply/thread and the quoted post for quote.
    async fn publish(
        &self,
        mode: Mode,
        text: &str,
        media: &[PathBuf],
        in_reply_to: Option<&str>,
    ) -> Result<String, PublishError>;
}

/// Media handler. Downloads attachments to local files.
#[async_trait::async_trait]
pub trait MediaPort: Send + Sync {
    /// Download the media of post `post_id`. Files already on disk are reused.
    async fn download(&self, post_id: &str, refs: &[MediaRef])
    -> Result<Vec<PathBuf>, MediaError>;

    /// Remove downloads older than `age`. Returns the number of files removed.
    async fn purge_older_than(&self, _age: Duration) -> Result<usize, MediaError> {
        Ok(0)
    }
}

/// Run state store. A single record, plus a cross-process run lock.
#[async_trait::async_trait]
pub trait StatePort: Send + Sync {
    /// Current state. Missing or unreadable state is "never run", not an error.
    async fn load(&self) -> RunState;

    /// Replace the stored state.
    async fn save(&self, state: &RunState) -> Result<(), DomainError>;

    /// Take the run lock. `Ok(false)` when another invocation holds it.
    async fn try_lock(&self) -> Result<bool, DomainError>;

    /// Release the run lock taken by `try_lock`.
    async fn unlock(&self);
}

/// Archive of fetched posts (best effort; failures are logged by the caller).
#[async_trait::async_trait]
pub trait ArchivePort: Send + Sync {
    async fn append(&self, posts: &[Post]) -> Result<(), DomainError>;
}
