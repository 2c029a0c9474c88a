// SPDX-License-Identifier: MIT

use crate::adk::error::StepflowError;
use crate::adk::tool::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Named tools available to workflow definitions
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry with the built-in search and weather tools
    pub async fn with_builtin_tools() -> Self {
        use crate::stepflow::tools::{DuckDuckGoSearchTool, OpenMeteoTool};

        let registry = Self::new();
        registry
            .register(Arc::new(DuckDuckGoSearchTool::default()))
            .await;
        registry.register(Arc::new(OpenMeteoTool::new())).await;
        registry
    }

    /// Register a tool under its own name, replacing any previous one
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        log::debug!("Registered tool: {}", tool.name());
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let tools = self.tools.read().await;
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up every name, failing on the first unknown one
    pub async fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Tool>>, StepflowError> {
        let tools = self.tools.read().await;
        names
            .iter()
            .map(|name| {
                tools
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StepflowError::tool_not_found(name))
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
