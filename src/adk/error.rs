// SPDX-License-Identifier: MIT

//! Typed error handling for stepflow-rs
//!
//! Workflow-structural errors (a bad step graph) and state-validation errors
//! (bad input data) are kept apart so callers can report them differently.

use std::error::Error as StdError;
use thiserror::Error;

/// Error type returned by step functions
pub type StepError = Box<dyn StdError + Send + Sync>;

/// Top-level error type for stepflow-rs
#[derive(Debug, Error)]
pub enum StepflowError {
    /// Tool not found in the registry
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl StepflowError {
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// A workflow state failed validation against its schema
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{0}' is not declared in the state schema")]
    UnknownField(String),

    #[error("field '{field}' is invalid: {message}")]
    Constraint { field: String, message: String },

    #[error("{0}")]
    Invalid(String),
}

impl ValidationError {
    pub fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        // serde_json reports missing fields as "missing field `name` at line .."
        let message = err.to_string();
        if let Some(rest) = message.strip_prefix("missing field `") {
            if let Some(end) = rest.find('`') {
                return Self::MissingField(rest[..end].to_string());
            }
        }
        if let Some(rest) = message.strip_prefix("unknown field `") {
            if let Some(end) = rest.find('`') {
                return Self::UnknownField(rest[..end].to_string());
            }
        }
        Self::Invalid(message)
    }
}

/// Workflow-specific errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Initial or updated state is malformed
    #[error("Invalid workflow state: {0}")]
    Validation(#[from] ValidationError),

    /// State schema itself is malformed
    #[error("Invalid state schema: {0}")]
    Schema(String),

    #[error("Step '{0}' is already registered")]
    DuplicateStep(String),

    #[error("Invalid step name: {0:?}")]
    InvalidStepName(String),

    /// Transition to (or start at) a step that was never registered
    #[error("Unknown step '{to}'{}", .from.as_ref().map(|f| format!(" requested by '{}'", f)).unwrap_or_default())]
    UnknownStep { from: Option<String>, to: String },

    #[error("Workflow '{0}' has no steps")]
    EmptyWorkflow(String),

    /// Step-count ceiling reached, usually an unterminated cycle
    #[error("Step limit of {limit} exceeded before running '{step}'")]
    StepLimitExceeded { limit: usize, step: String },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Run aborted before step '{0}'")]
    Aborted(String),

    #[error("Workflow file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),
}

impl WorkflowError {
    /// True for errors caused by the shape of the step graph rather than by data
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateStep(_)
                | Self::InvalidStepName(_)
                | Self::UnknownStep { .. }
                | Self::EmptyWorkflow(_)
                | Self::StepLimitExceeded { .. }
                | Self::InvalidDefinition(_)
        )
    }

    /// True for errors caused by malformed state or schema
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Schema(_))
    }

    pub(crate) fn unknown_step(from: Option<&str>, to: impl Into<String>) -> Self {
        Self::UnknownStep {
            from: from.map(str::to_string),
            to: to.into(),
        }
    }
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API error from {provider} ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Tool execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool input: {0}")]
    InputValidation(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Agent run errors
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Agent '{name}' reached max iterations ({limit}) without an answer")]
    MaxIterations { name: String, limit: u32 },

    #[error(transparent)]
    Model(#[from] ModelError),
}
