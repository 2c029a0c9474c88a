// SPDX-License-Identifier: MIT

//! Multi-agent workflow
//!
//! Every agent added becomes one step. Steps run in the order agents were
//! added; each sees the original messages plus the answers of the agents
//! before it.

use crate::adk::agent::{Agent, ToolCallingAgent};
use crate::adk::error::{StepError, ValidationError, WorkflowError};
use crate::adk::memory::Memory;
use crate::adk::model::{Content, Model};
use crate::adk::tool::Tool;
use crate::stepflow::workflow::runner::{RunError, RunResult, Workflow};
use crate::stepflow::workflow::state::WorkflowState;
use crate::stepflow::workflow::step::{Step, StepResult, Transition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// State shared by the agents of an `AgentWorkflow`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentWorkflowState {
    /// Conversation the workflow was started with
    pub messages: Vec<Content>,
    /// Answers produced by the agents so far
    #[serde(default)]
    pub new_messages: Vec<Content>,
    #[serde(default)]
    pub final_answer: Option<String>,
}

impl WorkflowState for AgentWorkflowState {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::constraint(
                "messages",
                "at least one message is required",
            ));
        }
        Ok(())
    }
}

/// Parameters for an agent the workflow builds itself
pub struct AgentFactoryInput {
    pub name: String,
    pub instructions: Option<String>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub llm: Arc<dyn Model>,
    pub max_iterations: Option<u32>,
    /// Conversation memory for the built agent; unbounded when unset
    pub memory: Option<Box<dyn Memory>>,
}

impl AgentFactoryInput {
    pub fn new(name: impl Into<String>, llm: Arc<dyn Model>) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            tools: vec![],
            llm,
            max_iterations: None,
            memory: None,
        }
    }

    pub fn with_memory(mut self, memory: impl Memory + 'static) -> Self {
        self.memory = Some(Box::new(memory));
        self
    }

    fn build(self) -> ToolCallingAgent {
        let mut agent = ToolCallingAgent::new(self.name, self.llm, self.tools);
        if let Some(instructions) = self.instructions {
            agent = agent.with_instructions(instructions);
        }
        if let Some(max_iterations) = self.max_iterations {
            agent = agent.with_max_iterations(max_iterations);
        }
        if let Some(memory) = self.memory {
            agent = agent.with_boxed_memory(memory);
        }
        agent
    }
}

struct AgentStep {
    agent: Arc<dyn Agent>,
}

#[async_trait]
impl Step<AgentWorkflowState> for AgentStep {
    async fn call(&self, state: &mut AgentWorkflowState) -> StepResult {
        let history: Vec<Content> = state
            .messages
            .iter()
            .chain(state.new_messages.iter())
            .cloned()
            .collect();

        let output = self
            .agent
            .run_with_history(history)
            .await
            .map_err(|e| Box::new(e) as StepError)?;

        state.new_messages.push(Content::model(output.text.clone()));
        state.final_answer = Some(output.text);
        Ok(Transition::Next)
    }
}

/// Workflow of agents, each answering in turn
pub struct AgentWorkflow {
    workflow: Workflow<AgentWorkflowState>,
}

impl AgentWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            workflow: Workflow::new(name),
        }
    }

    /// Add an agent as a step named after the agent
    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) -> Result<&mut Self, WorkflowError> {
        let name = agent.meta().name;
        self.workflow.add_step(name, AgentStep { agent })?;
        Ok(self)
    }

    /// Build a `ToolCallingAgent` from `input` and add it
    pub fn add_agent_factory(
        &mut self,
        input: AgentFactoryInput,
    ) -> Result<&mut Self, WorkflowError> {
        self.add_agent(Arc::new(input.build()))
    }

    /// Remove the agent step called `name`
    pub fn del_agent(&mut self, name: &str) -> bool {
        self.workflow.remove_step(name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.workflow.step_names()
    }

    pub fn workflow(&self) -> &Workflow<AgentWorkflowState> {
        &self.workflow
    }

    pub async fn run(
        &self,
        messages: Vec<Content>,
    ) -> Result<RunResult<AgentWorkflowState>, RunError<AgentWorkflowState>> {
        let state = AgentWorkflowState {
            messages,
            ..Default::default()
        };
        self.workflow.run(state).await
    }
}
