//! Thin HTTP client for the X API v2: base URL, bearer auth, timeouts.

use crate::domain::DomainError;
use reqwest::RequestBuilder;
use std::time::Duration;

pub struct XApi {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl XApi {
    /// `base` is e.g. `https://api.x.com` (no trailing slash); `token` is sent
    /// as `Authorization: Bearer`.
    pub fn new(base: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedpilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::Config(format!("X HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.token)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.token)
    }
}

/// Error body, shortened for logs and error messages.
pub async fn error_body(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    text.chars().take(200).collect()
}
