// SPDX-License-Identifier: MIT

//! Schema-validated JSON state

use serde_json::{Map, Value};
use std::sync::Arc;

use super::schema::{json_type_name, StateFieldDef, StateSchema};
use super::WorkflowState;
use crate::adk::error::ValidationError;

/// Workflow state whose shape comes from a `StateSchema`
///
/// Every write is checked against the schema, so the state never holds an
/// undeclared field or a value of the wrong type.
#[derive(Debug, Clone)]
pub struct DynamicState {
    fields: Map<String, Value>,
    schema: Arc<StateSchema>,
}

impl DynamicState {
    /// Construct and validate a state from a JSON object
    ///
    /// `null` input is treated as an empty object. Absent optional fields
    /// take their schema default, if any; defaults are type-checked like
    /// provided values.
    pub fn new(schema: Arc<StateSchema>, initial: Value) -> Result<Self, ValidationError> {
        let provided = match initial {
            Value::Null => Map::new(),
            Value::Object(obj) => obj,
            other => {
                return Err(ValidationError::Invalid(format!(
                    "state must be a JSON object, found {}",
                    json_type_name(&other)
                )))
            }
        };

        if let Some(unknown) = provided.keys().find(|k| schema.get(k).is_none()) {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }

        let mut fields = Map::new();
        for (name, def) in &schema.fields {
            match provided.get(name) {
                Some(value) if !value.is_null() => {
                    Self::check_type(name, def, value)?;
                    fields.insert(name.clone(), value.clone());
                }
                _ => {
                    if let Some(default) = &def.default {
                        Self::check_type(name, def, default)?;
                        fields.insert(name.clone(), default.clone());
                    } else if def.required {
                        return Err(ValidationError::MissingField(name.clone()));
                    }
                }
            }
        }

        Ok(Self { fields, schema })
    }

    fn check_type(name: &str, def: &StateFieldDef, value: &Value) -> Result<(), ValidationError> {
        if def.field_type.matches(value) {
            Ok(())
        } else {
            Err(ValidationError::TypeMismatch {
                field: name.to_string(),
                expected: def.field_type.as_str().to_string(),
                found: json_type_name(value).to_string(),
            })
        }
    }

    /// Write a field; `null` clears an optional field
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ValidationError> {
        let def = self
            .schema
            .get(key)
            .ok_or_else(|| ValidationError::UnknownField(key.to_string()))?;

        if value.is_null() {
            if def.required {
                return Err(ValidationError::MissingField(key.to_string()));
            }
            self.fields.remove(key);
            return Ok(());
        }

        Self::check_type(key, def, &value)?;
        self.fields.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }
}

impl WorkflowState for DynamicState {
    fn validate(&self) -> Result<(), ValidationError> {
        for (name, def) in &self.schema.fields {
            match self.fields.get(name) {
                Some(value) => Self::check_type(name, def, value)?,
                None if def.required => return Err(ValidationError::MissingField(name.clone())),
                None => {}
            }
        }
        Ok(())
    }
}
