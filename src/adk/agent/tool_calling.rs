// SPDX-License-Identifier: MIT

//! Tool-calling agent
//!
//! Sends the conversation to a model and executes requested tool calls in a
//! loop until the model replies with non-empty text.

use super::{Agent, AgentMeta, AgentOutput};
use crate::adk::error::AgentError;
use crate::adk::memory::{Memory, UnconstrainedMemory};
use crate::adk::model::{Content, GenerationConfig, Model, Part, ROLE_TOOL};
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// LLM agent with tool calling support
pub struct ToolCallingAgent {
    name: String,
    description: String,
    instructions: Option<String>,
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
    /// Tool name -> index into `tools`
    tool_map: HashMap<String, usize>,
    config: Option<GenerationConfig>,
    max_iterations: u32,
    memory: Mutex<Box<dyn Memory>>,
    running: AtomicBool,
}

/// Clears the running flag when a run ends, including on error
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ToolCallingAgent {
    pub fn new(name: impl Into<String>, model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let tool_map = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        Self {
            name: name.into(),
            description: String::new(),
            instructions: None,
            model,
            tools,
            tool_map,
            config: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            memory: Mutex::new(Box::new(UnconstrainedMemory::new())),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// System instructions sent ahead of every conversation
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_memory(self, memory: impl Memory + 'static) -> Self {
        self.with_boxed_memory(Box::new(memory))
    }

    pub fn with_boxed_memory(mut self, memory: Box<dyn Memory>) -> Self {
        self.memory = Mutex::new(memory);
        self
    }

    /// Snapshot of the agent's conversation memory
    pub async fn memory_messages(&self) -> Vec<Content> {
        self.memory.lock().await.messages()
    }

    fn get_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tool_map.get(name).map(|&i| &self.tools[i])
    }

    fn acquire(&self) -> Result<RunningGuard<'_>, AgentError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AgentError::AlreadyRunning(self.name.clone()));
        }
        Ok(RunningGuard(&self.running))
    }

    async fn call_tool(&self, name: &str, args: Value) -> Value {
        log::info!("Tool call: {} {}", name, args);
        match self.get_tool(name) {
            Some(tool) => match tool.execute(args).await {
                Ok(res) => res,
                Err(e) => {
                    log::error!("Tool {} failed: {}", name, e);
                    json!({ "error": e.to_string() })
                }
            },
            None => {
                log::error!("Tool {} not found", name);
                json!({ "error": format!("Tool {} not found", name) })
            }
        }
    }

    async fn execute(&self, history: Vec<Content>) -> Result<AgentOutput, AgentError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(instructions) = &self.instructions {
            messages.push(Content::system(instructions.clone()));
        }
        messages.extend(history);

        for iteration in 1..=self.max_iterations {
            log::info!(
                "Agent {} iteration {}/{}",
                self.name,
                iteration,
                self.max_iterations
            );
            let response = self
                .model
                .generate_content(
                    &messages,
                    self.config.as_ref(),
                    Some(self.tools.as_slice()),
                )
                .await?;

            let calls: Vec<(String, Value)> = response
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::FunctionCall { name, args } => Some((name.clone(), args.clone())),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                let text = response.text();
                if !text.trim().is_empty() {
                    return Ok(AgentOutput {
                        text,
                        iterations: iteration,
                    });
                }
                log::warn!("Agent {} received an empty response, asking again", self.name);
                messages.push(response);
                continue;
            }

            let mut function_responses = Vec::with_capacity(calls.len());
            for (name, args) in calls {
                let result = self.call_tool(&name, args).await;
                function_responses.push(Part::FunctionResponse {
                    name,
                    response: result,
                });
            }

            messages.push(response);
            messages.push(Content {
                role: ROLE_TOOL.to_string(),
                parts: function_responses,
            });
        }

        log::error!(
            "Agent {} reached max iterations without a text response",
            self.name
        );
        Err(AgentError::MaxIterations {
            name: self.name.clone(),
            limit: self.max_iterations,
        })
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    fn meta(&self) -> AgentMeta {
        AgentMeta {
            name: self.name.clone(),
            description: self.description.clone(),
            tools: self.tools.iter().map(|t| t.name().to_string()).collect(),
        }
    }

    async fn run(&self, prompt: &str) -> Result<AgentOutput, AgentError> {
        let _guard = self.acquire()?;
        let history = {
            let mut memory = self.memory.lock().await;
            memory.add(Content::user(prompt));
            memory.messages()
        };

        let output = self.execute(history).await?;
        self.memory
            .lock()
            .await
            .add(Content::model(output.text.clone()));
        Ok(output)
    }

    async fn run_with_history(&self, history: Vec<Content>) -> Result<AgentOutput, AgentError> {
        self.execute(history).await
    }
}
