// SPDX-License-Identifier: MIT

//! Step-graph workflow runner
//!
//! Steps run strictly one after another. Each receives `&mut S` for its
//! duration and returns a [`Transition`]; the runner follows transitions
//! until `End`, an error, the step ceiling, or cancellation.

use crate::adk::error::{StepError, ValidationError, WorkflowError};
use crate::stepflow::workflow::state::WorkflowState;
use crate::stepflow::workflow::step::{step_fn, Step, StepResult, Transition};
use futures::future::BoxFuture;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Ceiling on executed steps per run unless configured otherwise
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Steps a single run may execute before failing with `StepLimitExceeded`
    pub max_steps: usize,
    /// Entry step; the first registered step when unset
    pub start: Option<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            start: None,
        }
    }
}

impl WorkflowConfig {
    /// Defaults, with `STEPFLOW_MAX_STEPS` overriding the ceiling when it parses
    pub fn from_env() -> Self {
        Self::from_lookup(env::var("STEPFLOW_MAX_STEPS").ok())
    }

    /// Defaults, with `max_steps` taken from a raw setting when it parses
    pub fn from_lookup(max_steps: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = max_steps {
            match raw.trim().parse::<usize>() {
                Ok(max_steps) => config.max_steps = max_steps,
                Err(_) => log::warn!("Ignoring invalid STEPFLOW_MAX_STEPS value: {}", raw),
            }
        }
        config
    }
}

/// One executed step in a run's trace
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: String,
    pub transition: Transition,
    pub elapsed_ms: u64,
}

/// Final state of a run that reached `End`
#[derive(Debug)]
pub struct RunResult<S> {
    pub run_id: Uuid,
    pub state: S,
    pub steps: Vec<StepRecord>,
}

/// A failed run, carrying the state as the failing step left it
pub struct RunError<S> {
    pub run_id: Uuid,
    pub error: WorkflowError,
    pub state: S,
    pub steps: Vec<StepRecord>,
}

impl<S> fmt::Debug for RunError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunError")
            .field("run_id", &self.run_id)
            .field("error", &self.error)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl<S> fmt::Display for RunError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Run {} failed: {}", self.run_id, self.error)
    }
}

impl<S> std::error::Error for RunError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

struct RegisteredStep<S> {
    handler: Arc<dyn Step<S>>,
    next: Option<String>,
}

/// A named set of steps over state type `S`
///
/// Steps are registered up front; `run` borrows the workflow immutably, so
/// the step set cannot change while any run is in progress. Runs share
/// nothing but the definition.
pub struct Workflow<S> {
    name: String,
    steps: HashMap<String, RegisteredStep<S>>,
    /// Registration order, used for the default entry and `Transition::Next`
    order: Vec<String>,
    config: WorkflowConfig,
}

impl<S: WorkflowState> Workflow<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: HashMap::new(),
            order: Vec::new(),
            config: WorkflowConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Step names in registration order
    pub fn step_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// The step a run starts from, if any
    pub fn start_step(&self) -> Option<&str> {
        self.config
            .start
            .as_deref()
            .or_else(|| self.order.first().map(String::as_str))
    }

    /// Set the entry step; checked against registered steps when a run starts
    pub fn set_start(&mut self, name: impl Into<String>) -> &mut Self {
        self.config.start = Some(name.into());
        self
    }

    pub fn add_step(
        &mut self,
        name: impl Into<String>,
        step: impl Step<S> + 'static,
    ) -> Result<&mut Self, WorkflowError> {
        self.register(name.into(), Arc::new(step), None)
    }

    /// Register a step whose `Transition::Next` goes to `next`
    pub fn add_step_with_next(
        &mut self,
        name: impl Into<String>,
        step: impl Step<S> + 'static,
        next: impl Into<String>,
    ) -> Result<&mut Self, WorkflowError> {
        self.register(name.into(), Arc::new(step), Some(next.into()))
    }

    /// Register an async closure as a step
    pub fn add_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<&mut Self, WorkflowError>
    where
        F: for<'a> Fn(&'a mut S) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
    {
        self.register(name.into(), Arc::new(step_fn(f)), None)
    }

    /// Register a shared step handler
    pub fn add_shared(
        &mut self,
        name: impl Into<String>,
        step: Arc<dyn Step<S>>,
        next: Option<String>,
    ) -> Result<&mut Self, WorkflowError> {
        self.register(name.into(), step, next)
    }

    fn register(
        &mut self,
        name: String,
        handler: Arc<dyn Step<S>>,
        next: Option<String>,
    ) -> Result<&mut Self, WorkflowError> {
        if name.trim().is_empty() {
            return Err(WorkflowError::InvalidStepName(name));
        }
        if self.steps.contains_key(&name) {
            return Err(WorkflowError::DuplicateStep(name));
        }

        log::debug!("Workflow {}: registered step {}", self.name, name);
        self.order.push(name.clone());
        self.steps.insert(name, RegisteredStep { handler, next });
        Ok(self)
    }

    /// Remove a step; returns false when no such step exists
    pub fn remove_step(&mut self, name: &str) -> bool {
        if self.steps.remove(name).is_none() {
            return false;
        }
        self.order.retain(|n| n != name);
        true
    }

    /// Run from the entry step, consuming and returning the state
    pub async fn run(&self, state: S) -> Result<RunResult<S>, RunError<S>> {
        self.run_inner(state, None).await
    }

    /// Like `run`, stopping with `Aborted` once `cancel` is cancelled
    ///
    /// The token is checked before every step; a step already running is
    /// allowed to finish.
    pub async fn run_with_signal(
        &self,
        state: S,
        cancel: &CancellationToken,
    ) -> Result<RunResult<S>, RunError<S>> {
        self.run_inner(state, Some(cancel)).await
    }

    /// Run against caller-owned state, returning only the trace
    ///
    /// On error the state keeps every mutation made before the failure.
    pub async fn run_in_place(&self, state: &mut S) -> Result<Vec<StepRecord>, WorkflowError> {
        let mut trace = Vec::new();
        self.execute(state, &mut trace, None).await?;
        Ok(trace)
    }

    async fn run_inner(
        &self,
        mut state: S,
        cancel: Option<&CancellationToken>,
    ) -> Result<RunResult<S>, RunError<S>> {
        let run_id = Uuid::new_v4();
        log::info!("Workflow {} run {} started", self.name, run_id);

        let mut steps = Vec::new();
        match self.execute(&mut state, &mut steps, cancel).await {
            Ok(()) => {
                log::info!(
                    "Workflow {} run {} finished after {} steps",
                    self.name,
                    run_id,
                    steps.len()
                );
                Ok(RunResult {
                    run_id,
                    state,
                    steps,
                })
            }
            Err(error) => {
                log::error!("Workflow {} run {} failed: {}", self.name, run_id, error);
                Err(RunError {
                    run_id,
                    error,
                    state,
                    steps,
                })
            }
        }
    }

    async fn execute(
        &self,
        state: &mut S,
        trace: &mut Vec<StepRecord>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), WorkflowError> {
        state.validate()?;

        let mut current = self.entry()?.to_string();
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(WorkflowError::Aborted(current));
            }
            if trace.len() >= self.config.max_steps {
                return Err(WorkflowError::StepLimitExceeded {
                    limit: self.config.max_steps,
                    step: current,
                });
            }

            let registered = self
                .steps
                .get(&current)
                .ok_or_else(|| WorkflowError::unknown_step(None, current.as_str()))?;

            log::info!("Workflow {}: executing step {}", self.name, current);
            let started = Instant::now();
            let transition = registered
                .handler
                .call(state)
                .await
                .map_err(|source| step_failure(&current, source))?;

            trace.push(StepRecord {
                step: current.clone(),
                transition: transition.clone(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            log::debug!("Step {} returned {:?}", current, transition);

            match self.resolve(&current, registered, transition)? {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }
    }

    fn entry(&self) -> Result<&str, WorkflowError> {
        match self.start_step() {
            Some(start) if self.steps.contains_key(start) => Ok(start),
            Some(start) => Err(WorkflowError::unknown_step(None, start)),
            None => Err(WorkflowError::EmptyWorkflow(self.name.clone())),
        }
    }

    /// Map a transition to the next step name, `None` meaning finished
    fn resolve(
        &self,
        current: &str,
        registered: &RegisteredStep<S>,
        transition: Transition,
    ) -> Result<Option<String>, WorkflowError> {
        let target = match transition {
            Transition::End => return Ok(None),
            Transition::Repeat => return Ok(Some(current.to_string())),
            Transition::Goto(name) => name,
            Transition::Next => match &registered.next {
                Some(next) => next.clone(),
                None => {
                    let position = self.order.iter().position(|n| n == current);
                    match position.and_then(|i| self.order.get(i + 1)) {
                        Some(following) => following.clone(),
                        None => return Ok(None),
                    }
                }
            },
        };

        if self.steps.contains_key(&target) {
            Ok(Some(target))
        } else {
            Err(WorkflowError::unknown_step(Some(current), target))
        }
    }
}

impl<S: WorkflowState + JsonSchema> Workflow<S> {
    /// JSON schema of the state type
    pub fn state_schema(&self) -> RootSchema {
        schemars::schema_for!(S)
    }
}

/// A `ValidationError` raised inside a step means the updated state is malformed
fn step_failure(step: &str, source: StepError) -> WorkflowError {
    match source.downcast::<ValidationError>() {
        Ok(validation) => WorkflowError::Validation(*validation),
        Err(source) => WorkflowError::StepFailed {
            step: step.to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    struct Trail {
        topic: String,
        #[serde(default)]
        visited: Vec<String>,
    }

    impl WorkflowState for Trail {
        fn validate(&self) -> Result<(), ValidationError> {
            if self.topic.is_empty() {
                return Err(ValidationError::constraint("topic", "must not be empty"));
            }
            Ok(())
        }
    }

    fn trail() -> Trail {
        Trail {
            topic: "rust".to_string(),
            visited: vec![],
        }
    }

    /// Records its name, then returns a fixed transition
    struct Visit(&'static str, Transition);

    #[async_trait]
    impl Step<Trail> for Visit {
        async fn call(&self, state: &mut Trail) -> StepResult {
            state.visited.push(self.0.to_string());
            Ok(self.1.clone())
        }
    }

    #[tokio::test]
    async fn test_chain_applies_mutations_in_order() {
        let mut wf: Workflow<Trail> = Workflow::new("chain");
        wf.add_step("a", Visit("a", Transition::goto("b")))
            .unwrap()
            .add_step("b", Visit("b", Transition::goto("c")))
            .unwrap()
            .add_step("c", Visit("c", Transition::End))
            .unwrap();

        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.state.visited, vec!["a", "b", "c"]);
        let traced: Vec<&str> = result.steps.iter().map(|r| r.step.as_str()).collect();
        assert_eq!(traced, vec!["a", "b", "c"]);
        assert_eq!(result.steps[2].transition, Transition::End);
    }

    #[tokio::test]
    async fn test_next_follows_registration_order_then_ends() {
        let mut wf: Workflow<Trail> = Workflow::new("ordered");
        wf.add_step("first", Visit("first", Transition::Next))
            .unwrap()
            .add_step("second", Visit("second", Transition::Next))
            .unwrap();

        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.state.visited, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_next_override() {
        let mut wf: Workflow<Trail> = Workflow::new("override");
        wf.add_step_with_next("a", Visit("a", Transition::Next), "c")
            .unwrap()
            .add_step("b", Visit("b", Transition::End))
            .unwrap()
            .add_step("c", Visit("c", Transition::End))
            .unwrap();

        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.state.visited, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_repeat_until_condition() {
        let mut wf: Workflow<Trail> = Workflow::new("repeat");
        wf.add_fn("loop", |state: &mut Trail| {
            Box::pin(async move {
                state.visited.push("loop".to_string());
                if state.visited.len() < 3 {
                    Ok(Transition::Repeat)
                } else {
                    Ok(Transition::End)
                }
            })
        })
        .unwrap();

        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.state.visited.len(), 3);
    }

    #[tokio::test]
    async fn test_explicit_start() {
        let mut wf: Workflow<Trail> = Workflow::new("start");
        wf.add_step("a", Visit("a", Transition::End))
            .unwrap()
            .add_step("b", Visit("b", Transition::goto("a")))
            .unwrap();
        wf.set_start("b");

        assert_eq!(wf.start_step(), Some("b"));
        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.state.visited, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_start() {
        let mut wf: Workflow<Trail> = Workflow::new("start");
        wf.add_step("a", Visit("a", Transition::End)).unwrap();
        wf.set_start("missing");

        let err = wf.run(trail()).await.unwrap_err();
        assert!(matches!(
            err.error,
            WorkflowError::UnknownStep { from: None, ref to } if to == "missing"
        ));
        assert!(err.state.visited.is_empty());
    }

    #[tokio::test]
    async fn test_empty_workflow() {
        let wf: Workflow<Trail> = Workflow::new("empty");
        let err = wf.run(trail()).await.unwrap_err();
        assert!(matches!(err.error, WorkflowError::EmptyWorkflow(name) if name == "empty"));
    }

    #[tokio::test]
    async fn test_duplicate_step_keeps_first() {
        let mut wf: Workflow<Trail> = Workflow::new("dup");
        wf.add_step("a", Visit("first", Transition::End)).unwrap();

        let err = wf
            .add_step("a", Visit("second", Transition::End))
            .err()
            .unwrap();
        assert!(matches!(err, WorkflowError::DuplicateStep(name) if name == "a"));
        assert_eq!(wf.step_names(), vec!["a"]);

        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.state.visited, vec!["first"]);
    }

    #[test]
    fn test_empty_step_name_rejected() {
        let mut wf: Workflow<Trail> = Workflow::new("names");
        let err = wf.add_step("  ", Visit("x", Transition::End)).err().unwrap();
        assert!(matches!(err, WorkflowError::InvalidStepName(_)));
        assert!(wf.step_names().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_step_keeps_mutations() {
        let mut wf: Workflow<Trail> = Workflow::new("broken");
        wf.add_step("a", Visit("a", Transition::goto("b")))
            .unwrap()
            .add_step("b", Visit("b", Transition::goto("nowhere")))
            .unwrap();

        let err = wf.run(trail()).await.unwrap_err();
        assert!(matches!(
            &err.error,
            WorkflowError::UnknownStep { from: Some(from), to } if from == "b" && to == "nowhere"
        ));
        assert!(err.error.is_structural());
        assert_eq!(err.state.visited, vec!["a", "b"]);
        assert_eq!(err.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_initial_state_runs_nothing() {
        let mut wf: Workflow<Trail> = Workflow::new("validate");
        wf.add_step("a", Visit("a", Transition::End)).unwrap();

        let err = wf.run(Trail::default()).await.unwrap_err();
        assert!(err.error.is_validation());
        assert!(err.state.visited.is_empty());
        assert!(err.steps.is_empty());
    }

    #[tokio::test]
    async fn test_step_error_propagates_with_state() {
        let mut wf: Workflow<Trail> = Workflow::new("failing");
        wf.add_fn("explode", |state: &mut Trail| {
            Box::pin(async move {
                state.visited.push("explode".to_string());
                Err(StepError::from("model unavailable"))
            })
        })
        .unwrap();

        let err = wf.run(trail()).await.unwrap_err();
        match &err.error {
            WorkflowError::StepFailed { step, source } => {
                assert_eq!(step, "explode");
                assert_eq!(source.to_string(), "model unavailable");
            }
            other => panic!("Expected StepFailed, got {:?}", other),
        }
        assert_eq!(err.state.visited, vec!["explode"]);
        assert!(err.steps.is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_from_step_surfaces_as_validation() {
        let mut wf: Workflow<Trail> = Workflow::new("bad-update");
        wf.add_fn("update", |_state: &mut Trail| {
            Box::pin(async move {
                Err(Box::new(ValidationError::UnknownField("oops".to_string())) as StepError)
            })
        })
        .unwrap();

        let err = wf.run(trail()).await.unwrap_err();
        assert!(matches!(
            err.error,
            WorkflowError::Validation(ValidationError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn test_cycle_hits_step_limit_exactly() {
        let mut wf: Workflow<Trail> = Workflow::new("cycle").with_max_steps(100);
        wf.add_step("a", Visit("a", Transition::goto("b")))
            .unwrap()
            .add_step("b", Visit("b", Transition::goto("a")))
            .unwrap();

        let err = wf.run(trail()).await.unwrap_err();
        assert!(matches!(
            err.error,
            WorkflowError::StepLimitExceeded { limit: 100, ref step } if step == "a"
        ));
        assert_eq!(err.state.visited.len(), 100);
        assert_eq!(err.steps.len(), 100);
    }

    #[tokio::test]
    async fn test_step_limit_not_triggered_early() {
        let mut wf: Workflow<Trail> = Workflow::new("bounded").with_max_steps(100);
        wf.add_fn("count", |state: &mut Trail| {
            Box::pin(async move {
                state.visited.push("count".to_string());
                if state.visited.len() == 100 {
                    Ok(Transition::End)
                } else {
                    Ok(Transition::Repeat)
                }
            })
        })
        .unwrap();

        let result = wf.run(trail()).await.unwrap();
        assert_eq!(result.steps.len(), 100);
    }

    #[tokio::test]
    async fn test_cancellation_checked_between_steps() {
        let token = CancellationToken::new();
        let trigger = token.clone();

        let mut wf: Workflow<Trail> = Workflow::new("abortable");
        wf.add_fn("first", move |state: &mut Trail| {
            let trigger = trigger.clone();
            Box::pin(async move {
                state.visited.push("first".to_string());
                trigger.cancel();
                Ok(Transition::Next)
            })
        })
        .unwrap()
        .add_step("second", Visit("second", Transition::End))
        .unwrap();

        let err = wf.run_with_signal(trail(), &token).await.unwrap_err();
        assert!(matches!(err.error, WorkflowError::Aborted(step) if step == "second"));
        assert_eq!(err.state.visited, vec!["first"]);
        assert_eq!(err.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();

        let mut wf: Workflow<Trail> = Workflow::new("cancelled");
        wf.add_step("a", Visit("a", Transition::End)).unwrap();

        let err = wf.run_with_signal(trail(), &token).await.unwrap_err();
        assert!(matches!(err.error, WorkflowError::Aborted(step) if step == "a"));
        assert!(err.state.visited.is_empty());

        let result = wf.run_with_signal(trail(), &CancellationToken::new()).await;
        assert_eq!(result.unwrap().state.visited, vec!["a"]);
    }

    #[tokio::test]
    async fn test_runs_are_independent() {
        let mut wf: Workflow<Trail> = Workflow::new("replay");
        wf.add_step("a", Visit("a", Transition::Next))
            .unwrap()
            .add_step("b", Visit("b", Transition::End))
            .unwrap();

        let first = wf.run(trail()).await.unwrap();
        let second = wf.run(trail()).await.unwrap();
        assert_eq!(first.state, second.state);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_run_in_place() {
        let mut wf: Workflow<Trail> = Workflow::new("in-place");
        wf.add_step("a", Visit("a", Transition::goto("missing")))
            .unwrap();

        let mut state = trail();
        let err = wf.run_in_place(&mut state).await.unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownStep { .. }));
        assert_eq!(state.visited, vec!["a"]);
    }

    #[test]
    fn test_remove_step() {
        let mut wf: Workflow<Trail> = Workflow::new("edit");
        wf.add_step("a", Visit("a", Transition::End))
            .unwrap()
            .add_step("b", Visit("b", Transition::End))
            .unwrap();

        assert!(wf.remove_step("a"));
        assert!(!wf.remove_step("a"));
        assert_eq!(wf.step_names(), vec!["b"]);
        assert_eq!(wf.start_step(), Some("b"));
    }

    #[test]
    fn test_state_schema_lists_required_fields() {
        let wf: Workflow<Trail> = Workflow::new("schema");
        let schema = serde_json::to_value(wf.state_schema()).unwrap();
        assert_eq!(schema["required"], serde_json::json!(["topic"]));
        assert!(schema["properties"]["visited"].is_object());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = WorkflowConfig::from_lookup(Some("7".to_string()));
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.start, None);

        let config = WorkflowConfig::from_lookup(Some("many".to_string()));
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(WorkflowConfig::from_lookup(None), WorkflowConfig::default());
    }
}
