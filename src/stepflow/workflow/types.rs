// SPDX-License-Identifier: MIT

//! YAML schema types for workflow definitions

use crate::stepflow::workflow::state::StateSchema;
use serde::{Deserialize, Serialize};

/// Top-level workflow file
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Entry step; the first listed step when absent
    pub start: Option<String>,
    /// Overrides the runner's step ceiling
    pub max_steps: Option<usize>,
    #[serde(default)]
    pub state: StateSchema,
    pub steps: Vec<StepDef>,
}

/// A single agent step
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StepDef {
    pub name: String,
    pub agent: AgentDef,
    /// Template with `{field}` placeholders filled from state
    pub prompt: String,
    /// State field receiving the agent's answer
    pub output: String,
    /// Step to run afterwards; the following listed step when absent
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDef {
    pub instructions: String,
    #[serde(default)]
    pub model: ModelDef,
    #[serde(default)]
    pub tools: Vec<String>,
    pub max_iterations: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ModelDef {
    /// Falls back to `OLLAMA_MODEL` when absent
    pub name: Option<String>,
    pub temperature: Option<f32>,
}
