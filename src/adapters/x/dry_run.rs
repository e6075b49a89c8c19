//! Publisher that only logs. Used by `--dry-run`.

use crate::domain::{Mode, PublishError};
use crate::ports::PublisherPort;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Default)]
pub struct DryRunPublisher {
    next: AtomicU64,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PublisherPort for DryRunPublisher {
    async fn publish(
        &self,
        mode: Mode,
        text: &str,
        media: &[PathBuf],
        in_reply_to: Option<&str>,
    ) -> Result<String, PublishError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("dry-run-{}", n);
        info!(
            mode = %mode,
            post_id = %id,
            reply_to = ?in_reply_to,
            media = media.len(),
            text = %text,
            "[DRY RUN] would publish"
        );
        Ok(id)
    }
}
