// SPDX-License-Identifier: MIT

//! State management for workflows
//!
//! This module provides:
//! - `WorkflowState` - trait for typed records threaded through a run
//! - `StateSchema` - shape and types of a schema-driven state
//! - `DynamicState` - JSON-object state validated against a `StateSchema`

mod schema;
mod store;

pub use schema::{FieldType, StateFieldDef, StateSchema};
pub use store::DynamicState;

use crate::adk::error::ValidationError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A record owned by one workflow run and mutated by its steps.
///
/// The shape is fixed by the implementing type. `validate` is the single
/// explicit check run at construction boundaries and before a run starts;
/// the default accepts any value the type can hold.
pub trait WorkflowState: Send + 'static {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Build a typed state from untyped input
///
/// Missing required fields and type mismatches surface as `ValidationError`,
/// as does a failing `validate`.
pub fn from_value<S>(value: Value) -> Result<S, ValidationError>
where
    S: WorkflowState + DeserializeOwned,
{
    let state: S = serde_json::from_value(value)?;
    state.validate()?;
    Ok(state)
}
