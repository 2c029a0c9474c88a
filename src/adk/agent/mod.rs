// SPDX-License-Identifier: MIT

//! Agent module - defines agent types for AI workflows
//!
//! This module provides the core Agent trait and implementations:
//! - `ToolCallingAgent` - LLM agent that calls tools until it can answer

mod tool_calling;

pub use tool_calling::ToolCallingAgent;

use crate::adk::error::AgentError;
use crate::adk::model::Content;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Descriptive metadata of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMeta {
    pub name: String,
    pub description: String,
    /// Names of the tools available to the agent
    pub tools: Vec<String>,
}

/// Result of an agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Final answer text
    pub text: String,
    /// Model round-trips used to produce the answer
    pub iterations: u32,
}

/// Core agent trait for all agent types
#[async_trait]
pub trait Agent: Send + Sync {
    fn meta(&self) -> AgentMeta;

    /// Run with `prompt` appended to the agent's own memory
    async fn run(&self, prompt: &str) -> Result<AgentOutput, AgentError>;

    /// Run over an explicit conversation, leaving the agent's memory untouched
    ///
    /// Touches no agent state, so concurrent calls are allowed.
    async fn run_with_history(&self, history: Vec<Content>) -> Result<AgentOutput, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple mock agent that transforms the last message
    pub struct MockAgent {
        name: String,
        transform: fn(String) -> String,
    }

    impl MockAgent {
        pub fn new(name: &str, transform: fn(String) -> String) -> Self {
            Self {
                name: name.to_string(),
                transform,
            }
        }
    }

    #[async_trait]
    impl Agent for MockAgent {
        fn meta(&self) -> AgentMeta {
            AgentMeta {
                name: self.name.clone(),
                description: String::new(),
                tools: vec![],
            }
        }

        async fn run(&self, prompt: &str) -> Result<AgentOutput, AgentError> {
            self.run_with_history(vec![Content::user(prompt)]).await
        }

        async fn run_with_history(
            &self,
            history: Vec<Content>,
        ) -> Result<AgentOutput, AgentError> {
            let last = history.last().map(Content::text).unwrap_or_default();
            Ok(AgentOutput {
                text: (self.transform)(last),
                iterations: 1,
            })
        }
    }

    #[tokio::test]
    async fn test_mock_agent() {
        let agent = MockAgent::new("test", |s| format!("{}-transformed", s));
        assert_eq!(agent.meta().name, "test");

        let result = agent.run("input").await.unwrap();
        assert_eq!(result.text, "input-transformed");
    }
}
