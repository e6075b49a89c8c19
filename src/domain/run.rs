//! Run bookkeeping: the persisted `RunState` value object and the per-run `RunResult`.
//!
//! `RunState` is loaded, checked by the timing gate, advanced with `advance`
//! and saved; it is never mutated in place by anything but the orchestrator.

use crate::domain::{GeneratedContent, Mode};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        })
    }
}

/// Pipeline stage, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Media,
    Generate,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Media => "media",
            Stage::Generate => "generate",
            Stage::Publish => "publish",
        })
    }
}

/// Persisted record of the last completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub last_run_timestamp: Option<DateTime<Utc>>,
    pub last_mode: Option<Mode>,
    pub run_count: u64,
    pub last_status: Option<RunStatus>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Last completed run per mode (auto schedule input).
    #[serde(default)]
    pub mode_last_run: BTreeMap<Mode, DateTime<Utc>>,
    /// UTC day `posts_today` counts for.
    #[serde(default)]
    pub posts_day: Option<NaiveDate>,
    #[serde(default)]
    pub posts_today: u32,
}

impl RunState {
    /// Posts already published on the UTC day of `now`.
    pub fn posts_on(&self, now: DateTime<Utc>) -> u32 {
        if self.posts_day == Some(now.date_naive()) {
            self.posts_today
        } else {
            0
        }
    }

    /// Returns the reason a non-forced run must not proceed, if any.
    ///
    /// A `now` earlier than the recorded timestamp (clock moved back) counts as too soon.
    pub fn gate(
        &self,
        now: DateTime<Utc>,
        min_interval: Duration,
        daily_post_limit: Option<u32>,
    ) -> Option<String> {
        if let Some(last) = self.last_run_timestamp {
            let elapsed = now.signed_duration_since(last);
            if elapsed < min_interval {
                let remaining = min_interval - elapsed.max(Duration::zero());
                return Some(format!(
                    "last run {} min ago, minimum interval is {} min ({} min remaining)",
                    elapsed.num_minutes().max(0),
                    min_interval.num_minutes(),
                    remaining.num_minutes().max(1)
                ));
            }
        }
        if let Some(limit) = daily_post_limit {
            let posted = self.posts_on(now);
            if posted >= limit {
                return Some(format!("daily post limit reached ({}/{})", posted, limit));
            }
        }
        None
    }

    /// Next state after a completed run that started at `started_at`.
    pub fn advance(
        &self,
        started_at: DateTime<Utc>,
        mode: Mode,
        status: RunStatus,
        published: usize,
        error: Option<String>,
    ) -> RunState {
        let timestamp = match self.last_run_timestamp {
            Some(prev) if prev > started_at => prev,
            _ => started_at,
        };
        let day = started_at.date_naive();
        // A thread counts once against the daily cap, however many parts it has.
        let counted = match mode {
            Mode::Thread => published.min(1),
            _ => published,
        };
        let posts_today = self
            .posts_on(started_at)
            .saturating_add(u32::try_from(counted).unwrap_or(u32::MAX));

        let mut mode_last_run = self.mode_last_run.clone();
        mode_last_run.insert(mode, timestamp);

        RunState {
            last_run_timestamp: Some(timestamp),
            last_mode: Some(mode),
            run_count: self.run_count + 1,
            last_status: Some(status),
            last_error: error,
            mode_last_run,
            posts_day: Some(day),
            posts_today,
        }
    }
}

/// Which stage failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub posts_fetched: usize,
    /// Ids of posts published during the run, in publish order.
    pub published: Vec<String>,
    pub content: Vec<GeneratedContent>,
    pub failure: Option<StageFailure>,
    pub skip_reason: Option<String>,
}

impl RunResult {
    pub fn skipped(mode: Mode, started_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Skipped,
            mode,
            started_at,
            posts_fetched: 0,
            published: Vec::new(),
            content: Vec::new(),
            failure: None,
            skip_reason: Some(reason.into()),
        }
    }

    /// CLI exit code: success and clean skips are 0.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Success | RunStatus::Skipped => 0,
            RunStatus::Failed => 1,
        }
    }
}
