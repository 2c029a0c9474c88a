// SPDX-License-Identifier: MIT

//! Steps and transitions

use crate::adk::error::StepError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// What a step asks the runner to do next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Run the named step
    Goto(String),
    /// Run the step's registered next step, or the following step in
    /// registration order, or finish when there is none
    Next,
    /// Run the same step again
    Repeat,
    /// Finish the run
    End,
}

impl Transition {
    pub fn goto(step: impl Into<String>) -> Self {
        Self::Goto(step.into())
    }
}

pub type StepResult = Result<Transition, StepError>;

/// A unit of workflow behavior
///
/// The step gets exclusive access to the state for the duration of `call`
/// and communicates the next transition through its return value only.
#[async_trait]
pub trait Step<S>: Send + Sync {
    async fn call(&self, state: &mut S) -> StepResult;
}

/// Adapts an async closure into a [`Step`]; build it with [`step_fn`]
pub struct StepFn<F>(F);

/// Wrap a closure returning a boxed future as a step
///
/// ```ignore
/// let step = step_fn(|state: &mut Counter| {
///     Box::pin(async move {
///         state.count += 1;
///         Ok(Transition::End)
///     })
/// });
/// ```
pub fn step_fn<S, F>(f: F) -> StepFn<F>
where
    F: for<'a> Fn(&'a mut S) -> BoxFuture<'a, StepResult> + Send + Sync,
{
    StepFn(f)
}

#[async_trait]
impl<S, F> Step<S> for StepFn<F>
where
    S: Send + 'static,
    F: for<'a> Fn(&'a mut S) -> BoxFuture<'a, StepResult> + Send + Sync,
{
    async fn call(&self, state: &mut S) -> StepResult {
        (self.0)(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bump;

    #[async_trait]
    impl Step<u32> for Bump {
        async fn call(&self, state: &mut u32) -> StepResult {
            *state += 1;
            Ok(Transition::Next)
        }
    }

    #[tokio::test]
    async fn test_struct_step() {
        let mut state = 1u32;
        let transition = Bump.call(&mut state).await.unwrap();
        assert_eq!(state, 2);
        assert_eq!(transition, Transition::Next);
    }

    #[tokio::test]
    async fn test_closure_step() {
        let step = step_fn(|state: &mut u32| {
            Box::pin(async move {
                *state *= 10;
                Ok(Transition::goto("next"))
            })
        });

        let mut state = 4u32;
        let transition = step.call(&mut state).await.unwrap();
        assert_eq!(state, 40);
        assert_eq!(transition, Transition::Goto("next".to_string()));
    }
}
