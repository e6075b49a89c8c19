//! In-memory fakes for every outbound port.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use feedpilot::domain::{
    DomainError, FetchError, GenerateError, MediaError, MediaKind, MediaRef, Mode, Post,
    PublishError, RunState, Target,
};
use feedpilot::ports::{FeedPort, GeneratorPort, MediaPort, PublisherPort, StatePort};
use feedpilot::usecases::{AutoSchedule, Orchestrator, OrchestratorSettings, Pipeline};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
}

pub fn post(id: &str, text: &str) -> Post {
    Post {
        id: id.into(),
        author: "alice".into(),
        text: text.into(),
        media_refs: vec![],
        timestamp: at(8, 0),
    }
}

pub fn long_post(id: &str) -> Post {
    post(id, &format!("Post {} with enough words to be worth a reply from us", id))
}

pub fn media_post(id: &str) -> Post {
    Post {
        media_refs: vec![MediaRef {
            url: format!("https://pbs.example/{}.jpg", id),
            kind: MediaKind::Photo,
        }],
        ..long_post(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feed
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeFeed {
    result: Mutex<Result<Vec<Post>, FetchError>>,
    pub calls: AtomicUsize,
    pub last_target: Mutex<Option<(Target, usize)>>,
}

impl FakeFeed {
    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self::with_result(Ok(posts))
    }

    pub fn with_result(result: Result<Vec<Post>, FetchError>) -> Self {
        Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
            last_target: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl FeedPort for FakeFeed {
    async fn fetch(&self, target: &Target, limit: usize) -> Result<Vec<Post>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_target.lock().unwrap() = Some((target.clone(), limit));
        self.result
            .lock()
            .unwrap()
            .clone()
            .map(|mut posts| {
                posts.truncate(limit);
                posts
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generator
// ─────────────────────────────────────────────────────────────────────────────

pub struct FakeGenerator {
    scripted: Mutex<VecDeque<Result<String, GenerateError>>>,
    pub calls: AtomicUsize,
    pub contexts: Mutex<Vec<(Mode, String)>>,
}

impl FakeGenerator {
    /// Answers "Generated text" unless responses are scripted.
    pub fn new() -> Self {
        Self::scripted(vec![])
    }

    pub fn scripted(responses: Vec<Result<String, GenerateError>>) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl GeneratorPort for FakeGenerator {
    async fn generate(&self, mode: Mode, context: &str) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts
            .lock()
            .unwrap()
            .push((mode, context.to_string()));
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Generated text".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Publisher
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub mode: Mode,
    pub text: String,
    pub media: Vec<PathBuf>,
    pub in_reply_to: Option<String>,
}

pub struct FakePublisher {
    /// Fail the n-th call (1-based) with this error.
    fail_on: Option<(usize, PublishError)>,
    pub calls: AtomicUsize,
    pub published: Mutex<Vec<Published>>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(call: usize, error: PublishError) -> Self {
        Self {
            fail_on: Some((call, error)),
            ..Self::new()
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PublisherPort for FakePublisher {
    async fn publish(
        &self,
        mode: Mode,
        text: &str,
        media: &[PathBuf],
        in_reply_to: Option<&str>,
    ) -> Result<String, PublishError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((fail_at, err)) = &self.fail_on {
            if *fail_at == n {
                return Err(err.clone());
            }
        }
        self.published.lock().unwrap().push(Published {
            mode,
            text: text.to_string(),
            media: media.to_vec(),
            in_reply_to: in_reply_to.map(String::from),
        });
        Ok(format!("new-{}", n))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Media
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeMedia {
    pub downloads: AtomicUsize,
    pub purges: AtomicUsize,
}

#[async_trait::async_trait]
impl MediaPort for FakeMedia {
    async fn download(&self, post_id: &str, refs: &[MediaRef]) -> Result<Vec<PathBuf>, MediaError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok((0..refs.len())
            .map(|i| PathBuf::from(format!("media/post_{}_media_{}.jpg", post_id, i)))
            .collect())
    }

    async fn purge_older_than(&self, _age: Duration) -> Result<usize, MediaError> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemState {
    state: Mutex<RunState>,
    pub saves: AtomicUsize,
    pub locked: AtomicBool,
    pub lock_calls: AtomicUsize,
    /// Simulates another process holding the run lock.
    pub held_elsewhere: bool,
}

impl MemState {
    pub fn with(state: RunState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Default::default()
        }
    }

    /// Lock always reported as taken by another process.
    pub fn held_elsewhere() -> Self {
        Self {
            held_elsewhere: true,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> RunState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StatePort for MemState {
    async fn load(&self) -> RunState {
        self.snapshot()
    }

    async fn save(&self, state: &RunState) -> Result<(), DomainError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = state.clone();
        Ok(())
    }

    async fn try_lock(&self) -> Result<bool, DomainError> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        if self.held_elsewhere {
            return Ok(false);
        }
        Ok(!self.locked.swap(true, Ordering::SeqCst))
    }

    async fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub feed: Arc<FakeFeed>,
    pub generator: Arc<FakeGenerator>,
    pub publisher: Arc<FakePublisher>,
    pub media: Arc<FakeMedia>,
    pub thread_parts: usize,
}

impl Harness {
    pub fn new(feed: FakeFeed, generator: FakeGenerator, publisher: FakePublisher) -> Self {
        Self {
            feed: Arc::new(feed),
            generator: Arc::new(generator),
            publisher: Arc::new(publisher),
            media: Arc::new(FakeMedia::default()),
            thread_parts: 3,
        }
    }

    pub fn orchestrator(&self, state: Arc<dyn StatePort>) -> Orchestrator {
        self.orchestrator_with(state, OrchestratorSettings::default())
    }

    pub fn orchestrator_with(
        &self,
        state: Arc<dyn StatePort>,
        settings: OrchestratorSettings,
    ) -> Orchestrator {
        let pipeline = Pipeline::new(
            self.feed.clone(),
            self.generator.clone(),
            self.publisher.clone(),
            self.media.clone(),
        )
        .with_topics(vec!["rust".into()])
        .with_thread_parts(self.thread_parts);
        Orchestrator::new(pipeline, state, AutoSchedule::default(), settings)
    }
}
