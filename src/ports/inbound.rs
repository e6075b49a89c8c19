//! Inbound port. CLI and HTTP adapters call into the application.

use crate::domain::{DomainError, RunResult, RunState, TriggerInput};

/// Entry point shared by every trigger surface.
#[async_trait::async_trait]
pub trait RunTrigger: Send + Sync {
    /// Resolve the input to one action (auto schedule if needed) and execute it.
    async fn trigger(&self, input: TriggerInput, force: bool) -> Result<RunResult, DomainError>;

    /// Persisted state as currently on disk.
    async fn current_state(&self) -> RunState;
}
