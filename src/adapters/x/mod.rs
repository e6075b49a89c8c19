//! X (Twitter) API v2 adapters: feed reads and publishing.

pub mod api;
pub mod dry_run;
pub mod feed;
pub mod mapper;
pub mod publisher;

pub use api::XApi;
pub use dry_run::DryRunPublisher;
pub use feed::XFeed;
pub use publisher::XPublisher;
