use chronochat_llm::GenerateOptions;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ChronoChat, a helpful and friendly AI assistant. \
Provide accurate, concise, and helpful responses. \
Be conversational and engaging while maintaining professionalism.";

/// Answer used when the tool-round bound ends a turn without any text
pub const INCOMPLETE_FALLBACK: &str =
    "I wasn't able to finish working on this request. Here is what I have so far.";

/// Bounded exponential backoff for transient provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub system_prompt: String,
    pub max_tool_rounds: usize,
    /// Prior messages replayed to the provider
    pub history_limit: usize,
    pub retry: RetryPolicy,
    pub provider_timeout: Duration,
    pub store_timeout: Duration,
    pub cache_timeout: Duration,
    /// Hint returned with `ThreadBusy`
    pub busy_retry_after: Duration,
    pub generate_options: GenerateOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: 5,
            history_limit: 20,
            retry: RetryPolicy::default(),
            provider_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(5),
            cache_timeout: Duration::from_secs(1),
            busy_retry_after: Duration::from_secs(2),
            generate_options: GenerateOptions::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.generate_options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(200));
        assert_eq!(policy.backoff(1), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_secs(2));
    }
}
