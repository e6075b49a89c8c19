//! Media download adapter.

pub mod http_media;

pub use http_media::HttpMedia;
