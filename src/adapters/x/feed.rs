//! Implements FeedPort over the X API v2 (user timeline and recent search).

use crate::adapters::x::api::{XApi, error_body};
use crate::adapters::x::mapper::{TweetsPage, UserLookup, to_posts};
use crate::domain::{FetchError, Post, Target};
use crate::ports::FeedPort;
use crate::shared::retry::{RetryPolicy, retry_transient};
use reqwest::StatusCode;
use tracing::{info, warn};

const TWEET_FIELDS: &str = "created_at,author_id,attachments";
const EXPANSIONS: &str = "attachments.media_keys,author_id";
const MEDIA_FIELDS: &str = "url,preview_image_url,type,variants";

pub struct XFeed {
    api: XApi,
    retry: RetryPolicy,
}

impl XFeed {
    pub fn new(api: XApi) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn user_id(&self, handle: &str) -> Result<String, FetchError> {
        let path = format!("/2/users/by/username/{}", handle);
        let lookup: UserLookup = send_json(self.api.get(&path), handle).await?;
        lookup
            .data
            .map(|u| u.id)
            .ok_or_else(|| FetchError::NotFound(format!("@{}", handle)))
    }

    async fn timeline(&self, handle: &str, limit: usize) -> Result<Vec<Post>, FetchError> {
        let id = self.user_id(handle).await?;
        let path = format!("/2/users/{}/tweets", id);
        // The timeline endpoint accepts 5..=100.
        let max_results = limit.clamp(5, 100).to_string();
        let request = self.api.get(&path).query(&[
            ("max_results", max_results.as_str()),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", EXPANSIONS),
            ("media.fields", MEDIA_FIELDS),
        ]);
        let page: TweetsPage = send_json(request, handle).await?;
        Ok(to_posts(page, Some(handle)))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Post>, FetchError> {
        // Recent search accepts 10..=100.
        let max_results = limit.clamp(10, 100).to_string();
        let request = self.api.get("/2/tweets/search/recent").query(&[
            ("query", query),
            ("max_results", max_results.as_str()),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", EXPANSIONS),
            ("media.fields", MEDIA_FIELDS),
            ("user.fields", "username"),
        ]);
        let page: TweetsPage = send_json(request, query).await?;
        Ok(to_posts(page, None))
    }
}

async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<T, FetchError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(format!("HTTP request failed: {}", e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(response).await;
        warn!(status = %status, source = what, body = %body, "feed API returned error");
        return Err(match status {
            StatusCode::NOT_FOUND => FetchError::NotFound(what.to_string()),
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
            s if s.is_server_error() => FetchError::Network(format!("server error {}", s)),
            s => FetchError::Rejected(format!("API error {}: {}", s, body)),
        });
    }

    response
        .json()
        .await
        .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse API response: {}", e)))
}

#[async_trait::async_trait]
impl FeedPort for XFeed {
    async fn fetch(&self, target: &Target, limit: usize) -> Result<Vec<Post>, FetchError> {
        let mut posts = retry_transient(self.retry, "fetch", || async {
            match target {
                Target::Handle(h) => self.timeline(h, limit).await,
                Target::Query(q) => self.search(q, limit).await,
            }
        })
        .await?;
        posts.truncate(limit);
        info!(feed = %target, count = posts.len(), "fetched posts");
        Ok(posts)
    }
}
