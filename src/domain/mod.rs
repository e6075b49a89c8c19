//! Core domain layer. No external I/O dependencies.
//!
//! Entities, the persisted run state and the text rules live here. Dependencies flow inward.

pub mod compose;
pub mod entities;
pub mod errors;
pub mod run;

pub use entities::{
    ActionRequest, GeneratedContent, MAX_POST_CHARS, MediaKind, MediaRef, Mode, ModeSelector,
    Post, Target, TriggerInput,
};
pub use errors::{
    DomainError, FetchError, GenerateError, MediaError, PublishError, Transient,
};
pub use run::{RunResult, RunState, RunStatus, Stage, StageFailure};
