use crate::error::TurnError;
use crate::node::{Node, NodeType};
use crate::state::{Phase, TurnState};
use crate::tokens::TokenCounter;
use async_trait::async_trait;
use chronochat_llm::ToolCall;
use chronochat_tools::{ToolError, ToolRegistry};
use chronochat_types::{ToolTrace, TurnMode};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Runs every pending tool call concurrently and feeds the results back
pub struct ToolNode {
    tools: Arc<ToolRegistry>,
    tokens: TokenCounter,
}

impl ToolNode {
    pub fn new(tools: Arc<ToolRegistry>, tokens: TokenCounter) -> Self {
        Self { tools, tokens }
    }

    /// Never fails: tool errors become structured output for the provider
    async fn invoke(&self, call: &ToolCall, mode: TurnMode) -> ToolTrace {
        let started = Instant::now();

        let (input, result) = match call.arguments_value() {
            Ok(input) => {
                let result = self.tools.invoke(call.name(), mode, input.clone()).await;
                (input, result)
            }
            Err(e) => (
                Value::Null,
                Err(ToolError::InvalidInput(format!("arguments are not valid JSON: {}", e))),
            ),
        };

        let (output, error) = match result {
            Ok(output) => (output, None),
            Err(e) => (e.to_output(), Some(e.to_string())),
        };

        ToolTrace {
            call_id: call.id.clone(),
            tool_name: call.name().to_string(),
            input,
            output: Some(output),
            latency_ms: started.elapsed().as_millis() as u64,
            error,
        }
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn execute(&self, state: &mut TurnState) -> Result<(), TurnError> {
        state.phase = Phase::ToolDispatch;

        let calls = state.pending_tool_calls().to_vec();
        if calls.is_empty() {
            return Ok(());
        }

        let mode = state.mode;
        let traces = join_all(calls.iter().map(|call| self.invoke(call, mode))).await;
        for trace in traces {
            let content = trace.output.as_ref().map(Value::to_string).unwrap_or_default();
            let tokens = self.tokens.count(&content);
            debug!(
                thread_id = %state.thread_id,
                tool = %trace.tool_name,
                ok = trace.succeeded(),
                latency_ms = trace.latency_ms,
                "Tool result recorded"
            );
            state.add_tool_result(trace, content, tokens);
        }

        state.tool_rounds += 1;
        Ok(())
    }

    fn node_type(&self) -> NodeType {
        NodeType::Tool
    }
}
