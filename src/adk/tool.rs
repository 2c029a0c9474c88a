// SPDX-License-Identifier: MIT

use crate::adk::error::ToolError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Trait for tools that can be called by agents.
///
/// `name()`, `description()` and `schema()` return borrowed data; store
/// them in struct fields or statics.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within an agent's tool set)
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

/// Deserialize tool input, mapping serde failures to `ToolError::InputValidation`
pub fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InputValidation(e.to_string()))
}
