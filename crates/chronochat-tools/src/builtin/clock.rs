use crate::capability::ToolCapability;
use crate::error::ToolError;
use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use serde_json::{json, Value};
use std::time::Duration;

/// Current date and time, optionally shifted to a UTC offset
pub struct CurrentTimeTool {
    schema: Value,
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": {
                    "utc_offset_minutes": {"type": "integer", "minimum": -720, "maximum": 840}
                },
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolCapability for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Return the current date and time"
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let now = Utc::now();
        let offset_minutes = input
            .get("utc_offset_minutes")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let offset = FixedOffset::east_opt((offset_minutes * 60) as i32)
            .ok_or_else(|| ToolError::InvalidInput("offset out of range".into()))?;

        Ok(json!({
            "utc": now.to_rfc3339(),
            "local": now.with_timezone(&offset).to_rfc3339(),
            "unix": now.timestamp(),
        }))
    }
}
