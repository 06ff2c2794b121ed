use crate::capability::ToolCapability;
use crate::error::{RegistrationError, ToolError};
use chronochat_llm::Tool;
use chronochat_types::TurnMode;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

struct RegisteredTool {
    capability: Arc<dyn ToolCapability>,
    validator: JSONSchema,
}

/// Summary of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolListEntry {
    pub name: String,
    pub version: String,
    pub description: String,
    pub input_schema: Value,
}

/// Collects tools before the registry is frozen
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: Arc<dyn ToolCapability>) -> Result<Self, RegistrationError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }

        let validator = JSONSchema::options()
            .compile(tool.input_schema())
            .map_err(|e| RegistrationError::Schema {
                name: name.clone(),
                message: e.to_string(),
            })?;

        self.tools.insert(
            name,
            RegisteredTool {
                capability: tool,
                validator,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        ToolRegistry {
            tools: self.tools,
            names,
        }
    }
}

/// Closed set of tools, immutable once built
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    /// Sorted, so descriptor order is stable across calls
    names: Vec<String>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    pub fn empty() -> Self {
        ToolRegistryBuilder::new().build()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<ToolListEntry> {
        self.names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|entry| {
                let tool = &entry.capability;
                ToolListEntry {
                    name: tool.name().to_string(),
                    version: tool.version().to_string(),
                    description: tool.description().to_string(),
                    input_schema: tool.input_schema().clone(),
                }
            })
            .collect()
    }

    /// Provider descriptors for the tools offered in `mode`
    pub fn descriptors(&self, mode: TurnMode) -> Vec<Tool> {
        self.names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter(|entry| entry.capability.modes().contains(&mode))
            .map(|entry| {
                let tool = &entry.capability;
                Tool::new(tool.name(), tool.description(), tool.input_schema().clone())
            })
            .collect()
    }

    /// Validate `input` and run the tool under its hard timeout
    ///
    /// A tool that is registered but not offered in `mode` is `NotFound`.
    pub async fn invoke(&self, name: &str, mode: TurnMode, input: Value) -> Result<Value, ToolError> {
        let entry = self
            .tools
            .get(name)
            .filter(|entry| entry.capability.modes().contains(&mode))
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        if let Err(errors) = entry.validator.validate(&input) {
            let message: String = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ToolError::InvalidInput(message));
        }

        let timeout = entry.capability.timeout();
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, entry.capability.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(timeout)),
        };

        debug!(
            tool = %name,
            version = %entry.capability.version(),
            latency_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Tool invoked"
        );
        result
    }
}
