//! Infrastructure adapters. Implement ports.
//!
//! X API, AI endpoint, filesystem, HTTP and CLI surfaces. Map errors to the domain enums.

pub mod ai;
pub mod cli;
pub mod media;
pub mod persistence;
pub mod web;
pub mod x;
