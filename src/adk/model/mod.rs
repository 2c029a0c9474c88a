// SPDX-License-Identifier: MIT

//! Model module - chat model trait and message types
//!
//! Backends live in their own submodules:
//! - [ollama] - local Ollama chat API

pub mod ollama;

use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    /// JSON schema the reply must conform to (structured output)
    pub response_schema: Option<serde_json::Value>,
}

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";
pub const ROLE_TOOL: &str = "tool";

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ROLE_SYSTEM, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ROLE_USER, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(ROLE_MODEL, text)
    }

    /// Concatenated text parts (thinking and tool parts are skipped)
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Parts of a message - text, thinking, function calls, etc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Part {
    Text(String),
    /// Reasoning emitted by thinking models
    Thinking(String),
    /// Function/tool call requested by the model
    FunctionCall {
        name: String,
        args: serde_json::Value,
    },
    /// Response from executing a function/tool
    FunctionResponse {
        name: String,
        response: serde_json::Value,
    },
}

/// Core trait for chat model backends
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError>;
}
