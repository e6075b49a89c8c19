//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by CLI/HTTP adapters into the application
//! - Outbound: Called by application into infrastructure

pub mod inbound;
pub mod outbound;

pub use inbound::RunTrigger;
pub use outbound::{ArchivePort, FeedPort, GeneratorPort, MediaPort, PublisherPort, StatePort};
