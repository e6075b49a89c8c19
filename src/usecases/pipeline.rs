//! Per-mode work: fetch -> generate -> publish.
//!
//! - One handler per `Mode`, picked by `match`
//! - The first failing stage aborts the run; nothing is retried here
//! - `PipelineOutcome` is filled as work happens, so a failed run still
//!   reports what was fetched and published

use crate::domain::compose::{fit_to_limit, post_context, select_posts, split_thread};
use crate::domain::{
    ActionRequest, DomainError, GenerateError, GeneratedContent, Mode, Post, Target,
};
use crate::ports::{ArchivePort, FeedPort, GeneratorPort, MediaPort, PublisherPort};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What a mode handler got done, successful or not.
#[derive(Debug, Default, Clone)]
pub struct PipelineOutcome {
    pub posts_fetched: usize,
    pub published: Vec<String>,
    pub content: Vec<GeneratedContent>,
}

pub struct Pipeline {
    feed: Arc<dyn FeedPort>,
    generator: Arc<dyn GeneratorPort>,
    publisher: Arc<dyn PublisherPort>,
    media: Arc<dyn MediaPort>,
    archive: Option<Arc<dyn ArchivePort>>,
    topics: Vec<String>,
    thread_parts: usize,
    media_retention: Duration,
}

impl Pipeline {
    pub fn new(
        feed: Arc<dyn FeedPort>,
        generator: Arc<dyn GeneratorPort>,
        publisher: Arc<dyn PublisherPort>,
        media: Arc<dyn MediaPort>,
    ) -> Self {
        Self {
            feed,
            generator,
            publisher,
            media,
            archive: None,
            topics: Vec::new(),
            thread_parts: 4,
            media_retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchivePort>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Topics to pick from when a thread or standalone request names none.
    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_thread_parts(mut self, parts: usize) -> Self {
        self.thread_parts = parts.max(1);
        self
    }

    pub fn with_media_retention(mut self, retention: Duration) -> Self {
        self.media_retention = retention;
        self
    }

    /// Run the handler for `request.mode`, recording progress in `out`.
    pub async fn run(
        &self,
        request: &ActionRequest,
        out: &mut PipelineOutcome,
    ) -> Result<(), DomainError> {
        match request.mode {
            Mode::Reply => self.engage(Mode::Reply, request, out).await,
            Mode::Quote => self.engage(Mode::Quote, request, out).await,
            Mode::Thread => self.thread(request, out).await,
            Mode::Standalone => self.standalone(request, out).await,
            Mode::Media => {
                let result = self.media_post(request, out).await;
                match self.media.purge_older_than(self.media_retention).await {
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "media cleanup failed"),
                }
                result
            }
        }
    }

    fn topic_for(&self, request: &ActionRequest) -> String {
        if let Some(topic) = &request.topic {
            return topic.trim().to_string();
        }
        self.topics
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "technology".to_string())
    }

    async fn fetch(
        &self,
        request: &ActionRequest,
        out: &mut PipelineOutcome,
    ) -> Result<Vec<Post>, DomainError> {
        let target: &Target = request.target.as_ref().ok_or_else(|| {
            DomainError::Validation(format!("mode '{}' requires a target", request.mode))
        })?;
        let posts = self.feed.fetch(target, request.limit).await?;
        out.posts_fetched = posts.len();

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.append(&posts).await {
                warn!(error = %e, "failed to archive fetched posts");
            }
        }
        Ok(posts)
    }

    async fn compose(
        &self,
        mode: Mode,
        context: &str,
        source_post_id: Option<&str>,
        out: &mut PipelineOutcome,
    ) -> Result<String, DomainError> {
        let raw = self.generator.generate(mode, context).await?;
        let text = fit_to_limit(&raw, mode.char_limit());
        if text.is_empty() {
            return Err(GenerateError::InvalidResponse("empty text after trimming".into()).into());
        }
        out.content.push(GeneratedContent {
            text: text.clone(),
            mode,
            source_post_id: source_post_id.map(String::from),
        });
        Ok(text)
    }

    /// Reply to or quote up to `count` fetched posts.
    async fn engage(
        &self,
        mode: Mode,
        request: &ActionRequest,
        out: &mut PipelineOutcome,
    ) -> Result<(), DomainError> {
        let posts = self.fetch(request, out).await?;
        if posts.is_empty() {
            info!(mode = %mode, "no posts found, nothing to do");
            return Ok(());
        }

        for post in select_posts(&posts, request.count) {
            let text = self
                .compose(mode, &post_context(post), Some(&post.id), out)
                .await?;
            let id = self
                .publisher
                .publish(mode, &text, &[], Some(&post.id))
                .await?;
            info!(mode = %mode, source = %post.id, post_id = %id, "engaged with post");
            out.published.push(id);
        }
        Ok(())
    }

    async fn thread(
        &self,
        request: &ActionRequest,
        out: &mut PipelineOutcome,
    ) -> Result<(), DomainError> {
        let topic = self.topic_for(request);
        info!(topic = %topic, parts = self.thread_parts, "generating thread");

        let raw = self.generator.generate(Mode::Thread, &topic).await?;
        let parts = split_thread(&raw, self.thread_parts);
        if parts.is_empty() {
            return Err(GenerateError::InvalidResponse(
                "no numbered parts in thread response".into(),
            )
            .into());
        }
        out.content.extend(parts.iter().map(|p| GeneratedContent {
            text: p.clone(),
            mode: Mode::Thread,
            source_post_id: None,
        }));

        let mut previous: Option<String> = None;
        for (i, part) in parts.iter().enumerate() {
            let id = self
                .publisher
                .publish(Mode::Thread, part, &[], previous.as_deref())
                .await?;
            info!(part = i + 1, of = parts.len(), post_id = %id, "published thread part");
            out.published.push(id.clone());
            previous = Some(id);
        }
        Ok(())
    }

    async fn standalone(
        &self,
        request: &ActionRequest,
        out: &mut PipelineOutcome,
    ) -> Result<(), DomainError> {
        let topic = self.topic_for(request);
        let text = self.compose(Mode::Standalone, &topic, None, out).await?;
        let id = self
            .publisher
            .publish(Mode::Standalone, &text, &[], None)
            .await?;
        info!(topic = %topic, post_id = %id, "published standalone post");
        out.published.push(id);
        Ok(())
    }

    async fn media_post(
        &self,
        request: &ActionRequest,
        out: &mut PipelineOutcome,
    ) -> Result<(), DomainError> {
        let posts = self.fetch(request, out).await?;
        let Some(post) = posts.iter().find(|p| !p.media_refs.is_empty()) else {
            info!(fetched = posts.len(), "no post with media found, nothing to do");
            return Ok(());
        };

        let files = self.media.download(&post.id, &post.media_refs).await?;
        let text = self
            .compose(Mode::Media, &post_context(post), Some(&post.id), out)
            .await?;
        let id = self
            .publisher
            .publish(Mode::Media, &text, &files, None)
            .await?;
        info!(source = %post.id, post_id = %id, files = files.len(), "published media post");
        out.published.push(id);
        Ok(())
    }
}
