// SPDX-License-Identifier: MIT

//! Two-step web search workflow: pick a query, then answer from the results

use crate::adk::error::{StepError, ValidationError, WorkflowError};
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::adk::tool::Tool;
use crate::stepflow::workflow::runner::Workflow;
use crate::stepflow::workflow::state::WorkflowState;
use crate::stepflow::workflow::step::{Step, StepResult, Transition};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const WEB_SEARCH_STEP: &str = "web_search";
pub const GENERATE_ANSWER_STEP: &str = "generate_answer";

static SEARCH_QUERY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "search_query": {
                "type": "string",
                "description": "Query to send to the search engine"
            }
        },
        "required": ["search_query"]
    })
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WebSearchState {
    pub input: String,
    #[serde(default)]
    pub search_results: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl WebSearchState {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            search_results: None,
            output: None,
        }
    }
}

impl WorkflowState for WebSearchState {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.input.trim().is_empty() {
            return Err(ValidationError::constraint("input", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search_query: String,
}

struct WebSearchStep {
    model: Arc<dyn Model>,
    search: Arc<dyn Tool>,
}

#[async_trait]
impl Step<WebSearchState> for WebSearchStep {
    async fn call(&self, state: &mut WebSearchState) -> StepResult {
        let prompt = format!(
            "Write a web search query that would find the information needed to answer \
             the following question. Respond with JSON only.\n\nQuestion: {}",
            state.input
        );
        let config = GenerationConfig {
            temperature: Some(0.0),
            response_schema: Some(SEARCH_QUERY_SCHEMA.clone()),
            ..Default::default()
        };

        let reply = self
            .model
            .generate_content(&[Content::user(prompt)], Some(&config), None)
            .await
            .map_err(|e| Box::new(e) as StepError)?;
        let query = match serde_json::from_str::<SearchQuery>(reply.text().trim()) {
            Ok(parsed) if !parsed.search_query.trim().is_empty() => parsed.search_query,
            _ => {
                log::warn!("Model did not return a search query, using the question");
                state.input.clone()
            }
        };
        log::info!("Searching for: {}", query);

        let results = self
            .search
            .execute(json!({ "query": query }))
            .await
            .map_err(|e| Box::new(e) as StepError)?;
        state.search_results = Some(serde_json::to_string(&results)?);

        Ok(Transition::goto(GENERATE_ANSWER_STEP))
    }
}

struct GenerateAnswerStep {
    model: Arc<dyn Model>,
}

#[async_trait]
impl Step<WebSearchState> for GenerateAnswerStep {
    async fn call(&self, state: &mut WebSearchState) -> StepResult {
        let results = state.search_results.as_deref().unwrap_or("[]");
        let prompt = format!(
            "Use the search results to answer the question.\n\n\
             Search results:\n{}\n\nQuestion: {}",
            results, state.input
        );

        let reply = self
            .model
            .generate_content(&[Content::user(prompt)], None, None)
            .await
            .map_err(|e| Box::new(e) as StepError)?;
        state.output = Some(reply.text());

        Ok(Transition::End)
    }
}

/// Build the search workflow over `model` and a search tool taking `{"query": ..}`
pub fn web_search_workflow(
    model: Arc<dyn Model>,
    search: Arc<dyn Tool>,
) -> Result<Workflow<WebSearchState>, WorkflowError> {
    let mut workflow = Workflow::new("web_search").with_max_steps(10);
    workflow
        .add_step(
            WEB_SEARCH_STEP,
            WebSearchStep {
                model: model.clone(),
                search,
            },
        )?
        .add_step(GENERATE_ANSWER_STEP, GenerateAnswerStep { model })?;
    Ok(workflow)
}
