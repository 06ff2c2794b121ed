use crate::error::ToolError;
use async_trait::async_trait;
use chronochat_types::TurnMode;
use serde_json::Value;
use std::time::Duration;

const ALL_MODES: &[TurnMode] = &[TurnMode::Normal, TurnMode::Retrieval];

/// A versioned tool the agent may call
///
/// Input is validated against `input_schema` before `execute` runs, and
/// `execute` is cancelled once `timeout` elapses.
#[async_trait]
pub trait ToolCapability: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str;

    fn input_schema(&self) -> &Value;

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// Conversation modes the tool is offered in
    fn modes(&self) -> &[TurnMode] {
        ALL_MODES
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}
