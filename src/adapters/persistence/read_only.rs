//! State wrapper for dry runs: the gate still reads real state, nothing is written.

use crate::domain::{DomainError, RunState};
use crate::ports::StatePort;
use std::sync::Arc;
use tracing::info;

pub struct ReadOnlyState {
    inner: Arc<dyn StatePort>,
}

impl ReadOnlyState {
    pub fn new(inner: Arc<dyn StatePort>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl StatePort for ReadOnlyState {
    async fn load(&self) -> RunState {
        self.inner.load().await
    }

    async fn save(&self, state: &RunState) -> Result<(), DomainError> {
        info!(
            run_count = state.run_count,
            status = ?state.last_status,
            "[DRY RUN] state not persisted"
        );
        Ok(())
    }

    async fn try_lock(&self) -> Result<bool, DomainError> {
        self.inner.try_lock().await
    }

    async fn unlock(&self) {
        self.inner.unlock().await
    }
}
