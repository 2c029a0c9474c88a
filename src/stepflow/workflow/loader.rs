// SPDX-License-Identifier: MIT

//! Workflow loader - YAML file loading and parsing

use super::types::WorkflowFile;
use crate::adk::error::{StepflowError, WorkflowError};
use std::fs;
use std::path::Path;

/// Loads workflow definitions from YAML files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowFile, StepflowError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(WorkflowError::FileNotFound(path.display().to_string()).into());
        }
        log::debug!("Loading workflow from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowFile, StepflowError> {
        let def: WorkflowFile = serde_yaml::from_str(content)?;
        if def.steps.is_empty() {
            return Err(WorkflowError::EmptyWorkflow(def.name).into());
        }
        Ok(def)
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}
