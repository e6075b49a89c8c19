//! Mock generator for running without an AI key.
//!
//! Returns canned, mode-shaped text so the rest of the pipeline (fitting,
//! thread parsing, publishing) runs unchanged.

use crate::domain::{GenerateError, Mode};
use crate::ports::GeneratorPort;
use std::time::Duration;
use tracing::info;

/// Mock content generator.
///
/// Simulates network latency with configurable delay.
pub struct MockGenerator {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
    thread_parts: usize,
}

impl MockGenerator {
    /// Create a new mock generator with default delay (100ms).
    pub fn new() -> Self {
        Self {
            delay_ms: 100,
            thread_parts: 4,
        }
    }

    /// Create a mock generator with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new()
        }
    }

    pub fn with_thread_parts(mut self, parts: usize) -> Self {
        self.thread_parts = parts;
        self
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GeneratorPort for MockGenerator {
    async fn generate(&self, mode: Mode, context: &str) -> Result<String, GenerateError> {
        info!(mode = %mode, context_len = context.len(), "[MOCK] Simulating AI generation");

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        let subject: String = context.chars().take(60).collect();
        Ok(match mode {
            Mode::Reply => format!("[MOCK] Interesting point. Replying to: {}", subject),
            Mode::Quote => format!("[MOCK] Worth a read: {}", subject),
            Mode::Media => format!("[MOCK] Sharing this: {}", subject),
            Mode::Standalone => format!("[MOCK] Thoughts on {} #mock", subject),
            Mode::Thread => (1..=self.thread_parts)
                .map(|i| format!("{}/{} [MOCK] Point {} about {}", i, self.thread_parts, i, subject))
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }
}
