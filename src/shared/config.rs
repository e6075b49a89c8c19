//! Application configuration. API credentials, paths, schedule knobs.

use crate::shared::retry::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix for all environment variables (`FEEDPILOT_AI_API_KEY`, ...).
pub const ENV_PREFIX: &str = "FEEDPILOT";

/// Default chat-completions endpoint: Gemini's OpenAI-compatible surface.
pub const DEFAULT_AI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

pub const DEFAULT_TOPICS: &[&str] = &[
    "Artificial intelligence and machine learning",
    "Emerging technology trends",
    "The future of AI and its impact",
    "Ethics and responsibility in AI",
    "Practical applications of machine learning",
    "Innovation and digital transformation",
    "Data science and predictive analytics",
    "Intelligent automation",
];

const DEFAULT_ENGAGEMENT_HOURS: &[u32] = &[9, 10, 11, 12, 18, 21];

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    /// Directory for state, lock, log, media and archive files. Read from FEEDPILOT_DATA_DIR.
    pub data_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Timing gate
    // ─────────────────────────────────────────────────────────────────────────
    /// Minimum minutes between two runs (default 30).
    #[serde(default)]
    pub min_interval_minutes: Option<u64>,

    /// Max posts per UTC day, a thread counting as one; unset disables the cap.
    #[serde(default)]
    pub daily_post_limit: Option<u32>,

    /// A run lock older than this is treated as abandoned (default 30).
    #[serde(default)]
    pub lock_stale_minutes: Option<u64>,

    /// Upper bound of the random delay before a run starts working (default 0).
    #[serde(default)]
    pub jitter_max_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // AI Configuration
    // ─────────────────────────────────────────────────────────────────────────
    /// AI API key. Read from FEEDPILOT_AI_API_KEY (or GEMINI_API_KEY).
    #[serde(default)]
    pub ai_api_key: Option<String>,

    /// OpenAI-compatible chat completions URL.
    #[serde(default)]
    pub ai_api_url: Option<String>,

    #[serde(default)]
    pub ai_model: Option<String>,

    /// Model retried once when the primary one returns 404.
    #[serde(default)]
    pub ai_fallback_model: Option<String>,

    /// Minimum delay between two AI calls in ms (default 1000).
    #[serde(default)]
    pub ai_min_interval_ms: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Platform (X API v2)
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub x_api_base: Option<String>,

    /// OAuth 2.0 user-context token used to publish. Read from FEEDPILOT_X_ACCESS_TOKEN.
    #[serde(default)]
    pub x_access_token: Option<String>,

    /// App-only bearer token for reads; falls back to the access token.
    #[serde(default)]
    pub x_bearer_token: Option<String>,

    /// Minimum delay between two publish calls in ms (default 3000).
    #[serde(default)]
    pub publish_delay_ms: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP behaviour shared by adapters
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    #[serde(default)]
    pub retry_attempts: Option<u32>,

    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Content & schedule
    // ─────────────────────────────────────────────────────────────────────────
    /// Comma-separated handles the auto schedule replies to (or TARGET_ACCOUNTS).
    #[serde(default)]
    pub targets: Option<String>,

    /// Search query used by the auto schedule when no handle is configured.
    #[serde(default)]
    pub default_query: Option<String>,

    /// Comma-separated topics for thread/standalone posts.
    #[serde(default)]
    pub topics: Option<String>,

    #[serde(default)]
    pub fetch_limit: Option<usize>,

    #[serde(default)]
    pub reply_count: Option<usize>,

    #[serde(default)]
    pub thread_parts: Option<usize>,

    /// Local hour at which the daily thread goes out (default 15).
    #[serde(default)]
    pub thread_hour: Option<u32>,

    /// Comma-separated local hours for engagement replies.
    #[serde(default)]
    pub engagement_hours: Option<String>,

    #[serde(default)]
    pub media_retention_days: Option<u64>,

    /// Append fetched posts to `<data_dir>/fetched_posts.csv`.
    #[serde(default)]
    pub archive_posts: Option<bool>,

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP trigger server
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub server_host: Option<String>,

    #[serde(default)]
    pub server_port: Option<u16>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        if let Ok(path) = std::env::var("FEEDPILOT_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c = c.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        c.build()?.try_deserialize()
    }

    /// Parse settings from a TOML document (config files and tests).
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Paths
    // ─────────────────────────────────────────────────────────────────────────

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or("./data"))
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir_or_default().join("state.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir_or_default().join("feedpilot.log")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir_or_default().join("media")
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir_or_default().join("fetched_posts.csv")
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Timing
    // ─────────────────────────────────────────────────────────────────────────

    /// Minimum interval between runs. Defaults to 30 minutes.
    pub fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_interval_minutes.unwrap_or(30) as i64)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_minutes.unwrap_or(30) * 60)
    }

    pub fn jitter_max(&self) -> Duration {
        Duration::from_secs(self.jitter_max_secs.unwrap_or(0))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(30))
    }

    pub fn publish_delay(&self) -> Duration {
        Duration::from_millis(self.publish_delay_ms.unwrap_or(3000))
    }

    pub fn ai_min_interval(&self) -> Duration {
        Duration::from_millis(self.ai_min_interval_ms.unwrap_or(1000))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts.unwrap_or(3),
            Duration::from_millis(self.retry_backoff_ms.unwrap_or(1000)),
        )
    }

    pub fn media_retention(&self) -> Duration {
        Duration::from_secs(self.media_retention_days.unwrap_or(7) * 24 * 60 * 60)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // AI Configuration Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the AI API key if configured. Falls back to GEMINI_API_KEY.
    pub fn ai_api_key(&self) -> Option<String> {
        self.ai_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn ai_api_url_or_default(&self) -> String {
        self.ai_api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_API_URL.to_string())
    }

    pub fn ai_model_or_default(&self) -> String {
        self.ai_model
            .clone()
            .unwrap_or_else(|| "gemini-2.0-flash".to_string())
    }

    /// Fallback model; an empty value disables the fallback.
    pub fn ai_fallback_model(&self) -> Option<String> {
        match &self.ai_fallback_model {
            Some(m) if m.trim().is_empty() => None,
            Some(m) => Some(m.clone()),
            None => Some("gemini-1.5-flash".to_string()),
        }
    }

    /// Returns true if AI is configured (API key present).
    pub fn is_ai_configured(&self) -> bool {
        self.ai_api_key().is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Platform Helpers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn x_api_base_or_default(&self) -> String {
        self.x_api_base
            .clone()
            .unwrap_or_else(|| "https://api.x.com".to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn x_access_token(&self) -> Option<String> {
        self.x_access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    /// Token used for reads: app bearer token, else the user access token.
    pub fn x_read_token(&self) -> Option<String> {
        self.x_bearer_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.x_access_token())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content & schedule helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Configured handles. Falls back to TARGET_ACCOUNTS.
    pub fn targets_list(&self) -> Vec<String> {
        let raw = self
            .targets
            .clone()
            .or_else(|| std::env::var("TARGET_ACCOUNTS").ok())
            .unwrap_or_default();
        split_list(&raw)
            .into_iter()
            .map(|h| h.trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty())
            .collect()
    }

    pub fn topics_list(&self) -> Vec<String> {
        match self.topics.as_deref().map(split_list) {
            Some(list) if !list.is_empty() => list,
            _ => DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Engagement hours; entries that are not an hour of the day are dropped.
    pub fn engagement_hours_list(&self) -> Vec<u32> {
        match self.engagement_hours.as_deref() {
            Some(raw) => split_list(raw)
                .iter()
                .filter_map(|h| h.parse::<u32>().ok())
                .filter(|h| *h < 24)
                .collect(),
            None => DEFAULT_ENGAGEMENT_HOURS.to_vec(),
        }
    }

    pub fn fetch_limit_or_default(&self) -> usize {
        self.fetch_limit.unwrap_or(15).max(1)
    }

    pub fn reply_count_or_default(&self) -> usize {
        self.reply_count.unwrap_or(1).max(1)
    }

    pub fn thread_parts_or_default(&self) -> usize {
        self.thread_parts.unwrap_or(4).clamp(2, 25)
    }

    pub fn thread_hour_or_default(&self) -> u32 {
        self.thread_hour.filter(|h| *h < 24).unwrap_or(15)
    }

    pub fn archive_enabled(&self) -> bool {
        self.archive_posts.unwrap_or(false)
    }

    pub fn server_addr(&self) -> String {
        format!(
            "{}:{}",
            self.server_host.as_deref().unwrap_or("0.0.0.0"),
            self.server_port.unwrap_or(5000)
        )
    }

    /// Names of required variables that are missing. The AI key is optional
    /// (a mock generator is used without it); the platform token is not,
    /// except for dry runs.
    pub fn missing_credentials(&self, dry_run: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !dry_run && self.x_access_token().is_none() {
            missing.push("FEEDPILOT_X_ACCESS_TOKEN");
        }
        missing
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
