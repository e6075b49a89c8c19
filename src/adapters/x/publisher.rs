//! Implements PublisherPort over the X API v2.
//!
//! Media files are uploaded first (`POST /2/media/upload`), then the post is
//! created (`POST /2/tweets`) with reply, quote and media fields as needed.

use crate::adapters::x::api::{XApi, error_body};
use crate::adapters::x::mapper::CreatedResponse;
use crate::domain::{Mode, PublishError};
use crate::ports::PublisherPort;
use crate::shared::pacer::Pacer;
use crate::shared::retry::{RetryPolicy, retry_if, retry_transient};
use reqwest::StatusCode;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub struct XPublisher {
    api: XApi,
    pacer: Pacer,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct CreatePost<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTo<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quote_tweet_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<MediaIds>,
}

#[derive(Debug, Serialize)]
struct ReplyTo<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Debug, Serialize)]
struct MediaIds {
    media_ids: Vec<String>,
}

impl XPublisher {
    pub fn new(api: XApi) -> Self {
        Self {
            api,
            pacer: Pacer::new(Duration::from_millis(3000)),
            retry: RetryPolicy::default(),
        }
    }

    /// Minimum delay between two publish calls.
    pub fn with_min_delay(mut self, gap: Duration) -> Self {
        self.pacer = Pacer::new(gap);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn upload(&self, path: &Path) -> Result<String, PublishError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PublishError::Rejected(format!("read media {}: {}", path.display(), e)))?;
        let (mime, category) = media_type(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| PublishError::Rejected(format!("media type {}: {}", mime, e)))?;
        let form = reqwest::multipart::Form::new()
            .text("media_category", category)
            .part("media", part);

        let created: CreatedResponse = send_created(self.api.post("/2/media/upload").multipart(form)).await?;
        let id = created
            .data
            .map(|d| d.id)
            .ok_or_else(|| PublishError::Rejected("media upload returned no id".to_string()))?;
        info!(path = %path.display(), media_id = %id, "uploaded media");
        Ok(id)
    }

    async fn create(
        &self,
        mode: Mode,
        text: &str,
        media_ids: &[String],
        in_reply_to: Option<&str>,
    ) -> Result<String, PublishError> {
        let (reply, quote_tweet_id) = match (mode, in_reply_to) {
            (Mode::Quote, Some(id)) => (None, Some(id)),
            (_, Some(id)) => (Some(ReplyTo { in_reply_to_tweet_id: id }), None),
            (_, None) => (None, None),
        };
        let body = CreatePost {
            text,
            reply,
            quote_tweet_id,
            media: (!media_ids.is_empty()).then(|| MediaIds {
                media_ids: media_ids.to_vec(),
            }),
        };
        let created: CreatedResponse = send_created(self.api.post("/2/tweets").json(&body)).await?;
        created
            .data
            .map(|d| d.id)
            .ok_or_else(|| PublishError::Rejected("post creation returned no id".to_string()))
    }
}

/// MIME type and upload category by file extension.
fn media_type(path: &Path) -> (&'static str, &'static str) {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => ("image/png", "tweet_image"),
        "gif" => ("image/gif", "tweet_gif"),
        "mp4" => ("video/mp4", "tweet_video"),
        "mov" => ("video/quicktime", "tweet_video"),
        _ => ("image/jpeg", "tweet_image"),
    }
}

async fn send_created(request: reqwest::RequestBuilder) -> Result<CreatedResponse, PublishError> {
    let response = request.send().await.map_err(|e| {
        if e.is_connect() {
            PublishError::Connect(e.to_string())
        } else if e.is_timeout() {
            PublishError::Timeout
        } else {
            PublishError::Network(format!("HTTP request failed: {}", e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        warn!(status = %status, body = %body, "platform API returned error");
        return Err(match status {
            StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                PublishError::Auth(format!("{}: {}", status, body))
            }
            s if s.is_server_error() => PublishError::Network(format!("server error {}", s)),
            s => PublishError::Rejected(format!("API error {}: {}", s, body)),
        });
    }

    response
        .json()
        .await
        .map_err(|e| PublishError::Rejected(format!("Failed to parse API response: {}", e)))
}

#[async_trait::async_trait]
impl PublisherPort for XPublisher {
    async fn publish(
        &self,
        mode: Mode,
        text: &str,
        media: &[PathBuf],
        in_reply_to: Option<&str>,
    ) -> Result<String, PublishError> {
        self.pacer.wait().await;

        let mut media_ids = Vec::with_capacity(media.len());
        for path in media {
            let id = retry_transient(self.retry, "upload", || self.upload(path)).await?;
            media_ids.push(id);
        }

        // Post creation is not idempotent: once the request may have reached
        // the platform, a retry could publish twice.
        let id = retry_if(
            self.retry,
            "publish",
            |e| matches!(e, PublishError::Connect(_)),
            || self.create(mode, text, &media_ids, in_reply_to),
        )
        .await?;
        info!(mode = %mode, post_id = %id, reply_to = ?in_reply_to, media = media_ids.len(), "published");
        Ok(id)
    }
}
