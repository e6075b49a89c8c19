//! OpenAI-compatible adapter for content generation.
//!
//! Works with any chat-completions endpoint: Gemini's OpenAI-compatible
//! surface (default), OpenAI itself, or a local Ollama instance.
//! Implements `GeneratorPort` with per-mode prompts, call pacing, transient
//! retries and a one-shot fallback model when the primary model is missing.

use crate::domain::{DomainError, GenerateError, MAX_POST_CHARS, Mode};
use crate::ports::GeneratorPort;
use crate::shared::pacer::Pacer;
use crate::shared::retry::{RetryPolicy, retry_transient};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const TEMPERATURE: f32 = 0.8;

/// OpenAI-compatible content generator.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    fallback_model: Option<String>,
    thread_parts: usize,
    pacer: Pacer,
    retry: RetryPolicy,
}

impl OpenAiAdapter {
    /// Create a new adapter.
    ///
    /// # Arguments
    /// * `api_url` - Full chat completions URL
    /// * `api_key` - API key (can be empty for local Ollama)
    /// * `model` - Model name (e.g., "gemini-2.0-flash", "llama3.2")
    /// * `timeout` - Per-call HTTP timeout
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("AI HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            fallback_model: None,
            thread_parts: 4,
            pacer: Pacer::new(Duration::from_millis(1000)),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_fallback_model(mut self, model: Option<String>) -> Self {
        self.fallback_model = model;
        self
    }

    pub fn with_thread_parts(mut self, parts: usize) -> Self {
        self.thread_parts = parts;
        self
    }

    /// Minimum delay between two completion calls.
    pub fn with_min_interval(mut self, gap: Duration) -> Self {
        self.pacer = Pacer::new(gap);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn max_tokens(mode: Mode) -> u32 {
        match mode {
            Mode::Reply => 100,
            Mode::Quote => 80,
            Mode::Thread => 400,
            Mode::Standalone | Mode::Media => 100,
        }
    }

    /// Build the user prompt for a mode. `context` is the source post for
    /// reply/quote/media and the topic for thread/standalone.
    fn prompt(&self, mode: Mode, context: &str) -> String {
        let limit = mode.char_limit();
        match mode {
            Mode::Reply => format!(
                "Generate a thoughtful, engaging reply to this post. Keep it under {limit} characters.\n\n\
                 {context}\n\n\
                 Requirements:\n\
                 - Relevant and engaging\n\
                 - Professional but conversational\n\
                 - Under {limit} characters\n\
                 - Not controversial or offensive\n\
                 - Add value to the conversation\n\n\
                 Reply:"
            ),
            Mode::Quote => format!(
                "Generate a quote comment for this post. Keep it under {limit} characters.\n\n\
                 {context}\n\n\
                 Requirements:\n\
                 - Add value or insight\n\
                 - Be concise and impactful\n\
                 - Under {limit} characters\n\
                 - Encourage engagement\n\
                 - Complement, don't repeat the original\n\n\
                 Quote comment:"
            ),
            Mode::Thread => {
                let n = self.thread_parts;
                format!(
                    "Generate a thread about: {context}\n\n\
                     Create {n} connected posts, each under {MAX_POST_CHARS} characters.\n\n\
                     Requirements:\n\
                     - Educational or insightful\n\
                     - Each post flows to the next\n\
                     - Professional tone\n\
                     - Include relevant hashtags\n\
                     - Number each post (1/{n}, 2/{n}, etc.)\n\n\
                     Format each post on a new line starting with the number.\n\n\
                     Thread:"
                )
            }
            Mode::Standalone => format!(
                "Generate an engaging post about: {context}\n\n\
                 Requirements:\n\
                 - Under {limit} characters\n\
                 - Engaging and thought-provoking\n\
                 - Include relevant hashtags (2-3 max)\n\
                 - Professional but conversational\n\
                 - Call to action or question to encourage engagement\n\n\
                 Post:"
            ),
            Mode::Media => format!(
                "Write a short caption to share the image or video attached to this post.\n\n\
                 {context}\n\n\
                 Requirements:\n\
                 - Under {limit} characters\n\
                 - Credit the original author\n\
                 - One or two relevant hashtags\n\n\
                 Caption:"
            ),
        }
    }

    /// One chat-completions call against `model`.
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
            max_tokens,
        };

        self.pacer.wait().await;
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(200).collect();
            warn!(status = %status, model, body = %body, "AI API returned error");
            return Err(match status.as_u16() {
                404 => GenerateError::ModelNotFound(model.to_string()),
                429 => GenerateError::QuotaExceeded(body),
                s if s >= 500 => GenerateError::Network(format!("server error {}", status)),
                _ => GenerateError::Rejected(format!("API error {}: {}", status, body)),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            GenerateError::InvalidResponse(format!("Failed to parse API response: {}", e))
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(GenerateError::InvalidResponse(
                "empty completion".to_string(),
            ));
        }
        debug!(raw_len = content.len(), "received AI response");
        Ok(content)
    }

    async fn complete_with_retry(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerateError> {
        retry_transient(self.retry, "generate", || {
            self.complete(model, prompt, max_tokens)
        })
        .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> GenerateError {
    if e.is_timeout() {
        GenerateError::Timeout
    } else {
        GenerateError::Network(format!("HTTP request failed: {}", e))
    }
}

/// Chat completions request.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat completions response.
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

#[async_trait::async_trait]
impl GeneratorPort for OpenAiAdapter {
    async fn generate(&self, mode: Mode, context: &str) -> Result<String, GenerateError> {
        info!(
            mode = %mode,
            model = %self.model,
            context_len = context.len(),
            "requesting AI content"
        );
        let prompt = self.prompt(mode, context);
        let max_tokens = Self::max_tokens(mode);

        let text = match self.complete_with_retry(&self.model, &prompt, max_tokens).await {
            Err(GenerateError::ModelNotFound(missing)) => match &self.fallback_model {
                Some(fallback) if *fallback != missing => {
                    error!(model = %missing, fallback = %fallback, "Model not found, trying fallback model");
                    self.complete_with_retry(fallback, &prompt, max_tokens).await?
                }
                _ => return Err(GenerateError::ModelNotFound(missing)),
            },
            other => other?,
        };

        info!(mode = %mode, text_len = text.chars().count(), "AI content generated");
        Ok(text)
    }
}
