//! End-to-end runs of the orchestrator against in-memory ports.

mod common;

use chrono::Duration;
use common::*;
use feedpilot::adapters::persistence::StateJson;
use feedpilot::domain::{
    ActionRequest, DomainError, FetchError, GenerateError, Mode, PublishError, RunState,
    RunStatus, Stage, Target,
};
use feedpilot::ports::StatePort;
use feedpilot::usecases::OrchestratorSettings;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn reply_to_alice() -> ActionRequest {
    ActionRequest::new(Mode::Reply)
        .with_target(Target::handle("alice"))
        .with_limit(3)
}

fn ran_at(minutes_before: i64) -> RunState {
    RunState {
        last_run_timestamp: Some(at(12, 0) - Duration::minutes(minutes_before)),
        run_count: 4,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_reply_success_increments_run_count() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1"), long_post("2"), long_post("3")]),
        FakeGenerator::new(),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let result = orch.execute_at(reply_to_alice(), false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.posts_fetched, 3);
    assert_eq!(result.published, vec!["new-1"]);
    assert_eq!(result.content[0].source_post_id.as_deref(), Some("1"));

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].mode, Mode::Reply);
    assert_eq!(published[0].in_reply_to.as_deref(), Some("1"));

    let contexts = h.generator.contexts.lock().unwrap().clone();
    assert!(contexts[0].1.starts_with("Post by @alice: Post 1"));

    let saved = state.snapshot();
    assert_eq!(saved.run_count, 1);
    assert_eq!(saved.last_run_timestamp, Some(at(12, 0)));
    assert_eq!(saved.last_mode, Some(Mode::Reply));
    assert_eq!(saved.last_status, Some(RunStatus::Success));
    assert_eq!(saved.posts_today, 1);
    assert!(!state.locked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_rate_limited_publish_fails_but_records_state() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1"), long_post("2"), long_post("3")]),
        FakeGenerator::new(),
        FakePublisher::failing_on(1, PublishError::RateLimited),
    );
    let state = Arc::new(MemState::with(ran_at(120)));
    let orch = h.orchestrator(state.clone());

    let result = orch.execute_at(reply_to_alice(), false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.exit_code(), 1);
    let failure = result.failure.unwrap();
    assert_eq!(failure.stage, Stage::Publish);
    assert!(result.published.is_empty());

    let saved = state.snapshot();
    assert_eq!(saved.last_run_timestamp, Some(at(12, 0)));
    assert_eq!(saved.run_count, 5);
    assert_eq!(saved.last_status, Some(RunStatus::Failed));
    assert!(saved.last_error.unwrap().starts_with("publish:"));
    assert_eq!(saved.posts_today, 0);
}

#[tokio::test]
async fn test_recent_run_is_skipped_without_side_effects() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1")]),
        FakeGenerator::new(),
        FakePublisher::new(),
    );
    let before = ran_at(10);
    let state = Arc::new(MemState::with(before.clone()));
    let orch = h.orchestrator(state.clone());

    let result = orch.execute_at(reply_to_alice(), false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Skipped);
    assert_eq!(result.exit_code(), 0);
    assert!(result.skip_reason.unwrap().contains("20 min remaining"));
    assert_eq!(h.feed.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.saves.load(Ordering::SeqCst), 0);
    assert_eq!(state.snapshot(), before);
    assert!(!state.locked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_force_bypasses_timing_gate() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1")]),
        FakeGenerator::new(),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::with(ran_at(1)));
    let orch = h.orchestrator(state.clone());

    let result = orch.execute_at(reply_to_alice(), true, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(state.snapshot().run_count, 5);
}

#[tokio::test]
async fn test_daily_cap_skips_until_next_day() {
    let h = Harness::new(FakeFeed::with_posts(vec![]), FakeGenerator::new(), FakePublisher::new());
    let capped = RunState {
        last_run_timestamp: Some(at(6, 0)),
        posts_day: Some(at(6, 0).date_naive()),
        posts_today: 2,
        ..Default::default()
    };
    let state = Arc::new(MemState::with(capped));
    let orch = h.orchestrator_with(
        state.clone(),
        OrchestratorSettings {
            daily_post_limit: Some(2),
            ..Default::default()
        },
    );
    let request = ActionRequest::new(Mode::Standalone);

    let today = orch.execute_at(request.clone(), false, at(18, 0)).await.unwrap();
    assert_eq!(today.status, RunStatus::Skipped);
    assert!(today.skip_reason.unwrap().contains("daily post limit"));

    let tomorrow = orch
        .execute_at(request, false, at(18, 0) + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(tomorrow.status, RunStatus::Success);
    assert_eq!(state.snapshot().posts_today, 1);
}

#[tokio::test]
async fn test_corrupt_state_file_is_treated_as_never_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{\"last_run_timestamp\": 12").unwrap();

    let h = Harness::new(FakeFeed::with_posts(vec![]), FakeGenerator::new(), FakePublisher::new());
    let store: Arc<dyn StatePort> = Arc::new(StateJson::new(&path));
    let orch = h.orchestrator(store.clone());

    let result = orch
        .execute_at(ActionRequest::new(Mode::Standalone), false, at(12, 0))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Success);
    let saved = store.load().await;
    assert_eq!(saved.run_count, 1);
    assert_eq!(saved.last_run_timestamp, Some(at(12, 0)));
    assert!(!dir.path().join("state.json.lock").exists());
}

#[tokio::test]
async fn test_empty_fetch_is_successful_noop() {
    let h = Harness::new(FakeFeed::with_posts(vec![]), FakeGenerator::new(), FakePublisher::new());
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let result = orch.execute_at(reply_to_alice(), false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.posts_fetched, 0);
    assert!(result.published.is_empty());
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.snapshot().run_count, 1);
    assert_eq!(state.snapshot().last_run_timestamp, Some(at(12, 0)));
}

#[tokio::test]
async fn test_validation_error_makes_no_calls() {
    let h = Harness::new(FakeFeed::with_posts(vec![]), FakeGenerator::new(), FakePublisher::new());
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let err = orch
        .execute_at(ActionRequest::new(Mode::Quote), true, at(12, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(state.lock_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.saves.load(Ordering::SeqCst), 0);
    assert_eq!(h.feed.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_held_lock_skips_run() {
    let h = Harness::new(FakeFeed::with_posts(vec![]), FakeGenerator::new(), FakePublisher::new());
    let state = Arc::new(MemState::held_elsewhere());
    let orch = h.orchestrator(state.clone());

    let result = orch
        .execute_at(ActionRequest::new(Mode::Standalone), true, at(12, 0))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Skipped);
    assert_eq!(result.skip_reason.as_deref(), Some("another run is in progress"));
    assert_eq!(state.saves.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fetch_failure_is_reported_with_stage() {
    let h = Harness::new(
        FakeFeed::with_result(Err(FetchError::NotFound("@ghost".into()))),
        FakeGenerator::new(),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let request = ActionRequest::new(Mode::Media).with_target(Target::handle("ghost"));
    let result = orch.execute_at(request, false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failure.unwrap().stage, Stage::Fetch);
    assert_eq!(state.snapshot().last_status, Some(RunStatus::Failed));
    // Cleanup still runs after a failed media attempt.
    assert_eq!(h.media.purges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_thread_is_published_as_chain() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![]),
        FakeGenerator::scripted(vec![Ok(
            "1/3 Ownership first\n2/3: Then borrowing\n3/3 Lifetimes last #rust".into(),
        )]),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let request = ActionRequest::new(Mode::Thread).with_topic("learning rust");
    let result = orch.execute_at(request, false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.published, vec!["new-1", "new-2", "new-3"]);
    let published = h.publisher.published();
    assert_eq!(published[0].text, "Ownership first");
    assert_eq!(published[0].in_reply_to, None);
    assert_eq!(published[1].in_reply_to.as_deref(), Some("new-1"));
    assert_eq!(published[2].in_reply_to.as_deref(), Some("new-2"));
    assert_eq!(h.generator.contexts.lock().unwrap()[0].1, "learning rust");
    // The whole thread is one post against the daily cap.
    assert_eq!(state.snapshot().posts_today, 1);
}

#[tokio::test]
async fn test_thread_failure_mid_chain_reports_published_parts() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![]),
        FakeGenerator::scripted(vec![Ok("1/3 a\n2/3 b\n3/3 c".into())]),
        FakePublisher::failing_on(2, PublishError::Auth("401".into())),
    );
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let result = orch
        .execute_at(ActionRequest::new(Mode::Thread), false, at(12, 0))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.published, vec!["new-1"]);
    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.snapshot().posts_today, 1);
}

#[tokio::test]
async fn test_unparseable_thread_fails_at_generate() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![]),
        FakeGenerator::scripted(vec![Ok("Here are some thoughts without numbering".into())]),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let result = orch
        .execute_at(ActionRequest::new(Mode::Thread), false, at(12, 0))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failure.unwrap().stage, Stage::Generate);
    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_quota_error_fails_at_generate() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1")]),
        FakeGenerator::scripted(vec![Err(GenerateError::QuotaExceeded("429".into()))]),
        FakePublisher::new(),
    );
    let orch = h.orchestrator(Arc::new(MemState::default()));

    let result = orch.execute_at(reply_to_alice(), false, at(12, 0)).await.unwrap();

    assert_eq!(result.failure.unwrap().stage, Stage::Generate);
    assert_eq!(h.publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_quote_is_fitted_and_quotes_source() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![post("9", "short"), long_post("10")]),
        FakeGenerator::scripted(vec![Ok("w".repeat(400))]),
        FakePublisher::new(),
    );
    let orch = h.orchestrator(Arc::new(MemState::default()));

    let request = ActionRequest::new(Mode::Quote)
        .with_target(Target::query("rust"))
        .with_limit(5);
    let result = orch.execute_at(request, false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    let published = h.publisher.published();
    assert_eq!(published[0].mode, Mode::Quote);
    // The short post is skipped in favour of a suitable one.
    assert_eq!(published[0].in_reply_to.as_deref(), Some("10"));
    assert_eq!(published[0].text.chars().count(), 230);
    assert!(published[0].text.ends_with("..."));
    assert_eq!(
        *h.feed.last_target.lock().unwrap(),
        Some((Target::query("rust"), 5))
    );
}

#[tokio::test]
async fn test_media_mode_publishes_downloaded_files() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1"), media_post("2")]),
        FakeGenerator::new(),
        FakePublisher::new(),
    );
    let orch = h.orchestrator(Arc::new(MemState::default()));

    let request = ActionRequest::new(Mode::Media).with_target(Target::handle("alice"));
    let result = orch.execute_at(request, false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    let published = h.publisher.published();
    assert_eq!(published[0].mode, Mode::Media);
    assert_eq!(published[0].media.len(), 1);
    assert_eq!(published[0].in_reply_to, None);
    assert_eq!(h.media.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(h.media.purges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_media_mode_without_media_is_noop() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![long_post("1")]),
        FakeGenerator::new(),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::default());
    let orch = h.orchestrator(state.clone());

    let request = ActionRequest::new(Mode::Media).with_target(Target::handle("alice"));
    let result = orch.execute_at(request, false, at(12, 0)).await.unwrap();

    assert_eq!(result.status, RunStatus::Success);
    assert!(result.published.is_empty());
    assert_eq!(h.media.downloads.load(Ordering::SeqCst), 0);
    assert_eq!(state.snapshot().run_count, 1);
}

#[tokio::test]
async fn test_forced_run_with_clock_behind_keeps_timestamp() {
    let h = Harness::new(FakeFeed::with_posts(vec![]), FakeGenerator::new(), FakePublisher::new());
    let ahead = RunState {
        last_run_timestamp: Some(at(13, 0)),
        ..Default::default()
    };
    let state = Arc::new(MemState::with(ahead));
    let orch = h.orchestrator(state.clone());

    let skipped = orch
        .execute_at(ActionRequest::new(Mode::Standalone), false, at(12, 0))
        .await
        .unwrap();
    assert_eq!(skipped.status, RunStatus::Skipped);

    orch.execute_at(ActionRequest::new(Mode::Standalone), true, at(12, 0))
        .await
        .unwrap();
    assert_eq!(state.snapshot().last_run_timestamp, Some(at(13, 0)));
}

#[tokio::test]
async fn test_thread_fits_in_last_daily_slot() {
    let h = Harness::new(
        FakeFeed::with_posts(vec![]),
        FakeGenerator::scripted(vec![Ok("1/3 a\n2/3 b\n3/3 c".into())]),
        FakePublisher::new(),
    );
    let state = Arc::new(MemState::with(RunState {
        last_run_timestamp: Some(at(6, 0)),
        posts_day: Some(at(6, 0).date_naive()),
        posts_today: 1,
        ..Default::default()
    }));
    let orch = h.orchestrator_with(
        state.clone(),
        OrchestratorSettings {
            daily_post_limit: Some(2),
            ..Default::default()
        },
    );

    let result = orch
        .execute_at(ActionRequest::new(Mode::Thread), false, at(15, 0))
        .await
        .unwrap();
    assert_eq!(result.published.len(), 3);
    assert_eq!(state.snapshot().posts_today, 2);

    let next = orch
        .execute_at(ActionRequest::new(Mode::Standalone), false, at(18, 0))
        .await
        .unwrap();
    assert_eq!(next.status, RunStatus::Skipped);
}
