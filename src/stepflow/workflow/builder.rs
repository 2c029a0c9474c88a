// SPDX-License-Identifier: MIT

//! Workflow builder - turns a `WorkflowFile` into a runnable workflow
//!
//! Each YAML step becomes a `ToolCallingAgent` wrapped in a `PromptStep`.
//! Every reference in the file (state fields, step names, tool names) is
//! checked here, so a built workflow can only fail at run time on bad data
//! or a failing agent.

use crate::adk::agent::{Agent, ToolCallingAgent};
use crate::adk::error::{StepError, StepflowError, ValidationError, WorkflowError};
use crate::adk::model::ollama::OllamaChatModel;
use crate::adk::model::{Content, GenerationConfig, Model};
use crate::stepflow::workflow::loader::WorkflowLoader;
use crate::stepflow::workflow::registry::ToolRegistry;
use crate::stepflow::workflow::runner::{RunError, RunResult, Workflow, WorkflowConfig};
use crate::stepflow::workflow::state::{DynamicState, StateSchema};
use crate::stepflow::workflow::step::{Step, StepResult, Transition};
use crate::stepflow::workflow::types::{ModelDef, StepDef, WorkflowFile};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Creates the chat model for a step's agent
pub trait ModelProvider: Send + Sync {
    fn model(&self, def: &ModelDef) -> Result<Arc<dyn Model>, StepflowError>;
}

/// Local Ollama models; the model name falls back to `OLLAMA_MODEL`
#[derive(Debug, Default, Clone)]
pub struct OllamaProvider;

impl ModelProvider for OllamaProvider {
    fn model(&self, def: &ModelDef) -> Result<Arc<dyn Model>, StepflowError> {
        let model = match &def.name {
            Some(name) => OllamaChatModel::new(name.clone()),
            None => OllamaChatModel::from_env(),
        };
        log::debug!("Using Ollama model {}", model.model_name());
        Ok(Arc::new(model))
    }
}

/// Split a template into literal text and `{field}` placeholders
///
/// `{{` and `}}` render a literal brace; a lone `}` is kept as text.
fn parse_template(template: &str) -> Result<Vec<Segment<'_>>, ValidationError> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(at) = rest.find(|c: char| c == '{' || c == '}') {
        if at > 0 {
            segments.push(Segment::Text(&rest[..at]));
        }
        let brace = &rest[at..at + 1];
        let after = &rest[at + 1..];
        if let Some(escaped) = after.strip_prefix(brace) {
            segments.push(Segment::Text(brace));
            rest = escaped;
            continue;
        }
        if brace == "}" {
            segments.push(Segment::Text(brace));
            rest = after;
            continue;
        }
        let close = after.find('}').ok_or_else(|| {
            ValidationError::Invalid(format!("unclosed placeholder in prompt '{}'", template))
        })?;
        let key = after[..close].trim();
        if key.is_empty() {
            return Err(ValidationError::Invalid(format!(
                "empty placeholder in prompt '{}'",
                template
            )));
        }
        segments.push(Segment::Field(key));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

enum Segment<'a> {
    Text(&'a str),
    /// Field name, or a dotted path into an object field
    Field(&'a str),
}

fn root_field(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

/// Fill `{field}` placeholders from `state`
///
/// Strings are inserted as-is and other values as JSON. Unset optional
/// fields render empty; a placeholder naming an undeclared field is an error.
pub fn render_template(template: &str, state: &DynamicState) -> Result<String, ValidationError> {
    let mut rendered = String::with_capacity(template.len());
    for segment in parse_template(template)? {
        match segment {
            Segment::Text(text) => rendered.push_str(text),
            Segment::Field(key) => {
                if state.schema().get(root_field(key)).is_none() {
                    return Err(ValidationError::UnknownField(key.to_string()));
                }
                match state.get_path(key) {
                    Some(Value::String(s)) => rendered.push_str(s),
                    Some(value) => rendered.push_str(&value.to_string()),
                    None => {}
                }
            }
        }
    }
    Ok(rendered)
}

/// Runs an agent on a rendered prompt and stores the answer in a state field
pub struct PromptStep {
    agent: Arc<dyn Agent>,
    prompt: String,
    output: String,
    next: Option<String>,
}

#[async_trait]
impl Step<DynamicState> for PromptStep {
    async fn call(&self, state: &mut DynamicState) -> StepResult {
        let prompt = render_template(&self.prompt, state)?;
        log::debug!("Prompt for {}: {}", self.agent.meta().name, prompt);

        let answer = self
            .agent
            .run_with_history(vec![Content::user(prompt)])
            .await
            .map_err(|e| Box::new(e) as StepError)?;
        state.set(&self.output, Value::String(answer.text))?;

        Ok(match &self.next {
            Some(next) => Transition::goto(next.clone()),
            None => Transition::Next,
        })
    }
}

/// A workflow built from a definition, together with its state schema
pub struct BuiltWorkflow {
    pub name: String,
    pub description: String,
    schema: Arc<StateSchema>,
    workflow: Workflow<DynamicState>,
}

impl BuiltWorkflow {
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn workflow(&self) -> &Workflow<DynamicState> {
        &self.workflow
    }

    /// Validate `initial` against the workflow's schema
    pub fn initial_state(&self, initial: Value) -> Result<DynamicState, ValidationError> {
        DynamicState::new(self.schema.clone(), initial)
    }

    /// Run from a state built by `initial_state`
    ///
    /// A failed run hands back the state as the failing step left it.
    pub async fn run(
        &self,
        state: DynamicState,
    ) -> Result<RunResult<DynamicState>, RunError<DynamicState>> {
        self.workflow.run(state).await
    }
}

/// High-level builder for constructing workflows from YAML definitions
pub struct Builder {
    loader: WorkflowLoader,
    registry: ToolRegistry,
    provider: Arc<dyn ModelProvider>,
}

impl Builder {
    pub fn new(registry: ToolRegistry, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            loader: WorkflowLoader::new(),
            registry,
            provider,
        }
    }

    /// Build a workflow from a YAML file path
    pub async fn build_file<P: AsRef<Path>>(&self, path: P) -> Result<BuiltWorkflow, StepflowError> {
        let def = self.loader.load_workflow(path)?;
        self.build(&def).await
    }

    /// Build a workflow from a parsed definition
    pub async fn build(&self, def: &WorkflowFile) -> Result<BuiltWorkflow, StepflowError> {
        def.state.check()?;
        check_references(def)?;

        let mut config = WorkflowConfig::from_env();
        if let Some(max_steps) = def.max_steps {
            config.max_steps = max_steps;
        }
        config.start = def.start.clone();
        let mut workflow = Workflow::new(def.name.clone()).with_config(config);

        for step_def in &def.steps {
            let step = self.build_step(step_def).await?;
            workflow.add_step(step_def.name.clone(), step)?;
        }

        log::info!(
            "Built workflow '{}' with {} steps",
            def.name,
            def.steps.len()
        );
        Ok(BuiltWorkflow {
            name: def.name.clone(),
            description: def.description.clone(),
            schema: Arc::new(def.state.clone()),
            workflow,
        })
    }

    async fn build_step(&self, def: &StepDef) -> Result<PromptStep, StepflowError> {
        let tools = self.registry.resolve(&def.agent.tools).await?;
        let model = self.provider.model(&def.agent.model)?;

        let mut agent = ToolCallingAgent::new(def.name.clone(), model, tools)
            .with_instructions(def.agent.instructions.clone());
        if let Some(temperature) = def.agent.model.temperature {
            agent = agent.with_config(GenerationConfig {
                temperature: Some(temperature),
                ..Default::default()
            });
        }
        if let Some(max_iterations) = def.agent.max_iterations {
            agent = agent.with_max_iterations(max_iterations);
        }

        Ok(PromptStep {
            agent: Arc::new(agent),
            prompt: def.prompt.clone(),
            output: def.output.clone(),
            next: def.next.clone(),
        })
    }
}

/// Every step output, placeholder, `next` and `start` must name something declared
fn check_references(def: &WorkflowFile) -> Result<(), WorkflowError> {
    if def.steps.is_empty() {
        return Err(WorkflowError::EmptyWorkflow(def.name.clone()));
    }

    let names: HashSet<&str> = def.steps.iter().map(|s| s.name.as_str()).collect();
    for step in &def.steps {
        if def.state.get(&step.output).is_none() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "step '{}' writes undeclared state field '{}'",
                step.name, step.output
            )));
        }

        for segment in parse_template(&step.prompt)? {
            if let Segment::Field(key) = segment {
                if def.state.get(root_field(key)).is_none() {
                    return Err(WorkflowError::InvalidDefinition(format!(
                        "prompt of step '{}' references undeclared state field '{}'",
                        step.name, key
                    )));
                }
            }
        }

        if let Some(next) = &step.next {
            if !names.contains(next.as_str()) {
                return Err(WorkflowError::unknown_step(
                    Some(step.name.as_str()),
                    next.as_str(),
                ));
            }
        }
    }

    if let Some(start) = &def.start {
        if !names.contains(start.as_str()) {
            return Err(WorkflowError::unknown_step(None, start.as_str()));
        }
    }
    Ok(())
}
