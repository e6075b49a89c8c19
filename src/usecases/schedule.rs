//! `auto` mode: picks one concrete action from the local clock and run state.
//!
//! 1. thread, at `thread_hour`, once per local day
//! 2. reply, during engagement hours, once per local hour (needs a target)
//! 3. standalone otherwise

use crate::domain::{Mode, RunState, Target};
use chrono::{DateTime, Timelike, TimeZone};

#[derive(Debug, Clone)]
pub struct AutoSchedule {
    pub thread_hour: u32,
    pub engagement_hours: Vec<u32>,
    /// Handles to engage with; the first one is used.
    pub targets: Vec<String>,
    /// Search query used when no handle is configured.
    pub default_query: Option<String>,
}

impl Default for AutoSchedule {
    fn default() -> Self {
        Self {
            thread_hour: 15,
            engagement_hours: vec![9, 10, 11, 12, 18, 21],
            targets: Vec::new(),
            default_query: None,
        }
    }
}

impl AutoSchedule {
    fn engagement_target(&self) -> Option<Target> {
        self.targets
            .iter()
            .find(|t| !t.trim().is_empty())
            .map(|h| Target::handle(h))
            .or_else(|| {
                self.default_query
                    .as_deref()
                    .filter(|q| !q.trim().is_empty())
                    .map(Target::query)
            })
    }

    /// Mode (and target, for replies) for an `auto` run at `now`.
    /// `target` overrides the configured engagement target.
    pub fn select<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        state: &RunState,
        target: Option<Target>,
    ) -> (Mode, Option<Target>) {
        let last_local = |mode: Mode| {
            state
                .mode_last_run
                .get(&mode)
                .map(|t| t.with_timezone(&now.timezone()))
        };

        let thread_done_today = last_local(Mode::Thread)
            .is_some_and(|t| t.date_naive() == now.date_naive());
        if now.hour() == self.thread_hour && !thread_done_today {
            return (Mode::Thread, None);
        }

        let replied_this_hour = last_local(Mode::Reply)
            .is_some_and(|t| t.date_naive() == now.date_naive() && t.hour() == now.hour());
        if self.engagement_hours.contains(&now.hour()) && !replied_this_hour {
            if let Some(target) = target.or_else(|| self.engagement_target()) {
                return (Mode::Reply, Some(target));
            }
        }

        (Mode::Standalone, None)
    }
}
