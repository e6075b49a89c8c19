//! Domain entities. Pure data structures for the core business.
//!
//! No X/HTTP types here; adapters map into these.

use crate::domain::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of action a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Reply,
    Quote,
    Thread,
    Standalone,
    Media,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Reply,
        Mode::Quote,
        Mode::Thread,
        Mode::Standalone,
        Mode::Media,
    ];

    /// Modes that read a feed before composing need a handle or query.
    pub fn requires_target(self) -> bool {
        matches!(self, Mode::Reply | Mode::Quote | Mode::Media)
    }

    /// Maximum characters of composed text for one post of this mode.
    /// Quotes leave room for the embedded post card.
    pub fn char_limit(self) -> usize {
        match self {
            Mode::Quote => MAX_POST_CHARS - 50,
            _ => MAX_POST_CHARS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Reply => "reply",
            Mode::Quote => "quote",
            Mode::Thread => "thread",
            Mode::Standalone => "standalone",
            Mode::Media => "media",
        }
    }
}

/// Platform limit for a single post.
pub const MAX_POST_CHARS: usize = 280;

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reply" => Ok(Mode::Reply),
            "quote" => Ok(Mode::Quote),
            "thread" => Ok(Mode::Thread),
            "standalone" => Ok(Mode::Standalone),
            "media" => Ok(Mode::Media),
            other => Err(DomainError::Validation(format!(
                "unknown mode '{}' (expected reply, quote, thread, standalone, media)",
                other
            ))),
        }
    }
}

/// Either a concrete mode or "let the schedule decide".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeSelector {
    #[default]
    Auto,
    Explicit(Mode),
}

impl FromStr for ModeSelector {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(ModeSelector::Auto)
        } else {
            s.parse().map(ModeSelector::Explicit)
        }
    }
}

/// Where posts are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Target {
    /// Account handle, stored without the leading `@`.
    Handle(String),
    /// Free-text search query.
    Query(String),
}

impl Target {
    pub fn handle(raw: &str) -> Self {
        Target::Handle(raw.trim().trim_start_matches('@').to_string())
    }

    pub fn query(raw: &str) -> Self {
        Target::Query(raw.trim().to_string())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Target::Handle(s) | Target::Query(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Handle(h) => write!(f, "@{}", h),
            Target::Query(q) => write!(f, "search:\"{}\"", q),
        }
    }
}

/// One unit of work. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub mode: Mode,
    pub target: Option<Target>,
    /// Subject for thread/standalone; a configured topic is picked when absent.
    pub topic: Option<String>,
    /// Posts to fetch from the target.
    pub limit: usize,
    /// Posts to act on (replies/quotes) out of the fetched ones.
    pub count: usize,
}

impl ActionRequest {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            target: None,
            topic: None,
            limit: 15,
            count: 1,
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Shape check, done before any network call or state change.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.mode.requires_target() {
            match &self.target {
                None => {
                    return Err(DomainError::Validation(format!(
                        "mode '{}' requires a target handle or query",
                        self.mode
                    )));
                }
                Some(t) if t.is_blank() => {
                    return Err(DomainError::Validation(format!(
                        "mode '{}' got an empty target",
                        self.mode
                    )));
                }
                Some(_) => {}
            }
            if self.limit == 0 {
                return Err(DomainError::Validation("limit must be at least 1".into()));
            }
            if self.count == 0 {
                return Err(DomainError::Validation("count must be at least 1".into()));
            }
            if self.count > self.limit {
                return Err(DomainError::Validation(format!(
                    "count ({}) cannot exceed limit ({})",
                    self.count, self.limit
                )));
            }
        }
        if let Some(topic) = &self.topic {
            if topic.trim().is_empty() {
                return Err(DomainError::Validation("topic is empty".into()));
            }
        }
        Ok(())
    }
}

/// Trigger input before the auto schedule has picked a concrete mode.
#[derive(Debug, Clone, Default)]
pub struct TriggerInput {
    pub selector: ModeSelector,
    pub target: Option<Target>,
    pub topic: Option<String>,
    pub limit: Option<usize>,
    pub count: Option<usize>,
}

impl TriggerInput {
    /// Checks that can be answered without state or clock (used by the HTTP layer
    /// to reject a request synchronously).
    pub fn precheck(&self) -> Result<(), DomainError> {
        if let ModeSelector::Explicit(mode) = self.selector {
            if mode.requires_target() && self.target.as_ref().is_none_or(Target::is_blank) {
                return Err(DomainError::Validation(format!(
                    "mode '{}' requires a target handle or query",
                    mode
                )));
            }
        }
        if self.limit == Some(0) || self.count == Some(0) {
            return Err(DomainError::Validation(
                "limit and count must be at least 1".into(),
            ));
        }
        if let (Some(limit), Some(count)) = (self.limit, self.count) {
            if count > limit {
                return Err(DomainError::Validation(format!(
                    "count ({}) cannot exceed limit ({})",
                    count, limit
                )));
            }
        }
        if self.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(DomainError::Validation("topic is empty".into()));
        }
        Ok(())
    }
}

/// A post read from the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub text: String,
    pub media_refs: Vec<MediaRef>,
    pub timestamp: DateTime<Utc>,
}

/// Downloadable attachment of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Gif,
}

/// Text produced by the generator, consumed once by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub text: String,
    pub mode: Mode,
    pub source_post_id: Option<String>,
}
