// SPDX-License-Identifier: MIT

pub mod agent;
pub mod builder;
pub mod loader;
pub mod registry;
pub mod runner;
pub mod state;
pub mod step;
pub mod types;
pub mod web_search;

pub use agent::{AgentFactoryInput, AgentWorkflow, AgentWorkflowState};
pub use builder::{render_template, Builder, BuiltWorkflow, ModelProvider, OllamaProvider};
pub use registry::ToolRegistry;
pub use runner::{RunError, RunResult, StepRecord, Workflow, WorkflowConfig};
pub use state::{DynamicState, WorkflowState};
pub use step::{step_fn, Step, StepResult, Transition};
pub use web_search::{web_search_workflow, WebSearchState};
