//! Run orchestrator: validate -> lock -> load state -> gate -> pipeline -> save state.
//!
//! - At most one action per invocation
//! - The timing gate and the daily cap are skipped with `force`
//! - State is saved after every completed run, failed ones included,
//!   and the run lock is released on every path

use crate::domain::{
    ActionRequest, DomainError, ModeSelector, RunResult, RunState, RunStatus, StageFailure,
    TriggerInput,
};
use crate::ports::{RunTrigger, StatePort};
use crate::usecases::pipeline::{Pipeline, PipelineOutcome};
use crate::usecases::schedule::AutoSchedule;
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub min_interval: chrono::Duration,
    pub daily_post_limit: Option<u32>,
    /// Upper bound of the random pause before work starts.
    pub jitter_max: Duration,
    /// Defaults for requests that leave `limit`/`count` unset.
    pub fetch_limit: usize,
    pub reply_count: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            min_interval: chrono::Duration::minutes(30),
            daily_post_limit: None,
            jitter_max: Duration::ZERO,
            fetch_limit: 15,
            reply_count: 1,
        }
    }
}

pub struct Orchestrator {
    pipeline: Pipeline,
    state: Arc<dyn StatePort>,
    schedule: AutoSchedule,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        pipeline: Pipeline,
        state: Arc<dyn StatePort>,
        schedule: AutoSchedule,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            pipeline,
            state,
            schedule,
            settings,
        }
    }

    pub async fn execute(
        &self,
        request: ActionRequest,
        force: bool,
    ) -> Result<RunResult, DomainError> {
        self.execute_at(request, force, Utc::now()).await
    }

    /// `execute` with an injected clock.
    pub async fn execute_at(
        &self,
        request: ActionRequest,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<RunResult, DomainError> {
        request.validate()?;

        if !self.state.try_lock().await? {
            info!(mode = %request.mode, "another run is in progress, skipping");
            return Ok(RunResult::skipped(
                request.mode,
                now,
                "another run is in progress",
            ));
        }

        let result = self.run_locked(&request, force, now).await;
        self.state.unlock().await;
        result
    }

    async fn run_locked(
        &self,
        request: &ActionRequest,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<RunResult, DomainError> {
        let state = self.state.load().await;

        if force {
            info!(mode = %request.mode, "forced run, timing gate bypassed");
        } else if let Some(reason) = state.gate(
            now,
            self.settings.min_interval,
            self.settings.daily_post_limit,
        ) {
            info!(mode = %request.mode, reason = %reason, "run skipped");
            return Ok(RunResult::skipped(request.mode, now, reason));
        }

        self.jitter().await;

        info!(
            mode = %request.mode,
            target = ?request.target,
            run = state.run_count + 1,
            "run started"
        );
        let mut out = PipelineOutcome::default();
        let failure = match self.pipeline.run(request, &mut out).await {
            Ok(()) => None,
            Err(e) => match e.stage() {
                Some(stage) => {
                    error!(mode = %request.mode, stage = %stage, error = %e, "run failed");
                    Some(StageFailure {
                        stage,
                        message: e.to_string(),
                    })
                }
                None => return Err(e),
            },
        };
        let status = if failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };

        let next = state.advance(
            now,
            request.mode,
            status,
            out.published.len(),
            failure.as_ref().map(|f| format!("{}: {}", f.stage, f.message)),
        );
        if let Err(e) = self.state.save(&next).await {
            error!(error = %e, "failed to persist run state");
            return Err(e);
        }

        info!(
            mode = %request.mode,
            status = %status,
            fetched = out.posts_fetched,
            published = out.published.len(),
            run_count = next.run_count,
            "run finished"
        );

        Ok(RunResult {
            status,
            mode: request.mode,
            started_at: now,
            posts_fetched: out.posts_fetched,
            published: out.published,
            content: out.content,
            failure,
            skip_reason: None,
        })
    }

    async fn jitter(&self) {
        let max = self.settings.jitter_max.as_secs();
        if max == 0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(0..=max);
        info!(delay_secs = secs, "random delay before run");
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    /// Turn trigger input into one concrete request. `auto` consults the
    /// schedule with the local clock and the persisted state.
    pub fn resolve<Tz: chrono::TimeZone>(
        &self,
        input: TriggerInput,
        now: &DateTime<Tz>,
        state: &RunState,
    ) -> ActionRequest {
        let (mode, target) = match input.selector {
            ModeSelector::Explicit(mode) => (mode, input.target),
            ModeSelector::Auto => {
                let (mode, target) = self.schedule.select(now, state, input.target);
                info!(mode = %mode, "auto schedule picked mode");
                (mode, target)
            }
        };

        let limit = input.limit.unwrap_or(self.settings.fetch_limit);
        let count = input
            .count
            .unwrap_or_else(|| self.settings.reply_count.min(limit));
        ActionRequest {
            mode,
            target,
            topic: input.topic,
            limit,
            count,
        }
    }
}

#[async_trait::async_trait]
impl RunTrigger for Orchestrator {
    async fn trigger(&self, input: TriggerInput, force: bool) -> Result<RunResult, DomainError> {
        input.precheck()?;
        let request = match input.selector {
            ModeSelector::Auto => {
                let state = self.state.load().await;
                self.resolve(input, &Local::now(), &state)
            }
            ModeSelector::Explicit(_) => self.resolve(input, &Utc::now(), &RunState::default()),
        };
        let result = self.execute(request, force).await;
        if let Err(e) = &result {
            warn!(error = %e, "run rejected");
        }
        result
    }

    async fn current_state(&self) -> RunState {
        self.state.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mode, Target};
    use crate::ports::{FeedPort, GeneratorPort, MediaPort, PublisherPort};
    use crate::domain::{FetchError, GenerateError, MediaError, MediaRef, Post, PublishError};
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct Unused;

    #[async_trait::async_trait]
    impl FeedPort for Unused {
        async fn fetch(&self, _: &Target, _: usize) -> Result<Vec<Post>, FetchError> {
            Ok(vec![])
        }
    }

    #[async_trait::async_trait]
    impl GeneratorPort for Unused {
        async fn generate(&self, _: Mode, topic: &str) -> Result<String, GenerateError> {
            Ok(format!("About {}", topic))
        }
    }

    #[async_trait::async_trait]
    impl PublisherPort for Unused {
        async fn publish(
            &self,
            _: Mode,
            _: &str,
            _: &[PathBuf],
            _: Option<&str>,
        ) -> Result<String, PublishError> {
            Ok("1".into())
        }
    }

    #[async_trait::async_trait]
    impl MediaPort for Unused {
        async fn download(&self, _: &str, _: &[MediaRef]) -> Result<Vec<PathBuf>, MediaError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct MemState(Mutex<RunState>);

    #[async_trait::async_trait]
    impl StatePort for MemState {
        async fn load(&self) -> RunState {
            self.0.lock().unwrap().clone()
        }
        async fn save(&self, state: &RunState) -> Result<(), DomainError> {
            *self.0.lock().unwrap() = state.clone();
            Ok(())
        }
        async fn try_lock(&self) -> Result<bool, DomainError> {
            Ok(true)
        }
        async fn unlock(&self) {}
    }

    fn orchestrator(settings: OrchestratorSettings) -> Orchestrator {
        let unused = Arc::new(Unused);
        let pipeline = Pipeline::new(unused.clone(), unused.clone(), unused.clone(), unused)
            .with_topics(vec!["rust".into()]);
        Orchestrator::new(
            pipeline,
            Arc::new(MemState::default()),
            AutoSchedule::default(),
            settings,
        )
    }

    #[test]
    fn test_resolve_explicit_uses_defaults() {
        let orch = orchestrator(OrchestratorSettings {
            fetch_limit: 2,
            reply_count: 5,
            ..Default::default()
        });
        let input = TriggerInput {
            selector: ModeSelector::Explicit(Mode::Reply),
            target: Some(Target::handle("alice")),
            ..Default::default()
        };
        let req = orch.resolve(input, &Utc::now(), &RunState::default());
        assert_eq!(req.mode, Mode::Reply);
        assert_eq!(req.limit, 2);
        // Defaulted count never exceeds the limit.
        assert_eq!(req.count, 2);
        assert!(req.validate().is_ok());
    }

    #[tokio::test]
    async fn test_trigger_standalone_updates_state() {
        let orch = orchestrator(OrchestratorSettings::default());
        let input = TriggerInput {
            selector: ModeSelector::Explicit(Mode::Standalone),
            ..Default::default()
        };
        let result = orch.trigger(input, false).await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.content[0].text, "About rust");
        assert_eq!(orch.current_state().await.run_count, 1);
    }

    #[tokio::test]
    async fn test_trigger_rejects_reply_without_target() {
        let orch = orchestrator(OrchestratorSettings::default());
        let input = TriggerInput {
            selector: ModeSelector::Explicit(Mode::Reply),
            ..Default::default()
        };
        let err = orch.trigger(input, true).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(orch.current_state().await, RunState::default());
    }
}
