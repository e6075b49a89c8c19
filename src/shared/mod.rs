//! Cross-cutting helpers: configuration, logging, retry and pacing.

pub mod config;
pub mod logging;
pub mod pacer;
pub mod retry;
