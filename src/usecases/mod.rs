//! Application use cases. Orchestrate domain logic via ports.

pub mod orchestrator;
pub mod pipeline;
pub mod schedule;

pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use schedule::AutoSchedule;
