use crate::config::RetryPolicy;
use crate::error::TurnError;
use crate::node::{Node, NodeType};
use crate::state::{Phase, TurnState};
use async_trait::async_trait;
use chronochat_llm::{CompletionProvider, GenerateOptions, GenerateRequest, Generation, ProviderError};
use chronochat_tools::ToolRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Calls the provider with the turn's history and the mode's tools
pub struct LLMNode {
    provider: Arc<dyn CompletionProvider>,
    tools: Arc<ToolRegistry>,
    options: GenerateOptions,
    retry: RetryPolicy,
    timeout: Duration,
}

impl LLMNode {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        tools: Arc<ToolRegistry>,
        options: GenerateOptions,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            tools,
            options,
            retry,
            timeout,
        }
    }

    /// Transient failures are retried with backoff; rejections never are.
    /// Cancellation stops the retry loop during backoff.
    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation, TurnError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.provider.generate(request.clone())).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            match result {
                Ok(generation) => return Ok(generation),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        provider = %self.provider.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(provider = %self.provider.name(), "Turn cancelled, abandoning retries");
                            return Err(TurnError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Node for LLMNode {
    async fn execute(&self, state: &mut TurnState) -> Result<(), TurnError> {
        state.phase = Phase::Generating;

        let request = GenerateRequest::new(state.history.clone())
            .with_tools(self.tools.descriptors(state.mode))
            .with_options(self.options);

        let started = Instant::now();
        let generation = self.generate(request, &state.cancel).await?;

        if let Some(usage) = generation.usage {
            state.provider_tokens += u64::from(usage.total_tokens);
        }
        debug!(
            thread_id = %state.thread_id,
            model = %generation.model,
            tool_calls = generation.completion.tool_calls().len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Generation complete"
        );

        state.record_completion(generation.completion, generation.model);
        Ok(())
    }

    fn node_type(&self) -> NodeType {
        NodeType::LLM
    }
}
