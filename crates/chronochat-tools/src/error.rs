use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Tool failures; these are fed back to the provider as data, never surfaced
/// to the end user as request errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid tool input: {0}")]
    InvalidInput(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("tool timed out after {0:?}")]
    Timeout(Duration),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "not_found",
            ToolError::InvalidInput(_) => "invalid_input",
            ToolError::ExecutionFailed(_) => "execution_failed",
            ToolError::Timeout(_) => "timeout",
        }
    }

    /// Structured tool output describing the failure
    pub fn to_output(&self) -> Value {
        json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("invalid input schema for {name}: {message}")]
    Schema { name: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_output_shape() {
        let output = ToolError::Timeout(Duration::from_secs(2)).to_output();
        assert_eq!(output["error"]["kind"], "timeout");
        assert!(output["error"]["message"].as_str().unwrap().contains("timed out"));
    }
}
