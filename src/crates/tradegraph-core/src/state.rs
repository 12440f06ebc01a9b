//! State schema and reducer gateway
//!
//! The engine's state is a JSON object with a closed set of fields. Every
//! field carries a [`Reducer`] that decides how concurrent partial updates
//! from parallel nodes merge into the accumulated value. All mutation flows
//! through [`StateSchema::apply`], which serializes commits per field, so no
//! node ever writes the state directly.
//!
//! # Built-in reducers
//!
//! | Reducer | Behavior | Use case |
//! |---------|----------|----------|
//! | [`PinnedReducer`] | First write sticks, later writes ignored | ticker, trade date |
//! | [`FirstNonEmptyReducer`] | First non-empty string wins | report fields |
//! | [`AppendReducer`] | Concatenate arrays | per-analyst message channels |
//! | [`MaxReducer`] | Numeric maximum | debate round counters |
//!
//! Domain-specific merge logic (debate state structural merges) implements
//! [`Reducer`] in the agents crate and registers through
//! [`StateSchema::add_field`] like any built-in.
//!
//! # Example
//!
//! ```rust
//! use tradegraph_core::state::{StateSchema, AppendReducer, FirstNonEmptyReducer};
//! use serde_json::json;
//!
//! let mut schema = StateSchema::new();
//! schema.add_field("market_messages", Box::new(AppendReducer));
//! schema.add_field("market_report", Box::new(FirstNonEmptyReducer));
//!
//! let mut state = json!({"market_messages": [], "market_report": ""});
//! schema.apply(&mut state, &json!({"market_report": "uptrend confirmed"})).unwrap();
//! // A second write loses: the field is assign-once per session.
//! schema.apply(&mut state, &json!({"market_report": "ignored"})).unwrap();
//! assert_eq!(state["market_report"], "uptrend confirmed");
//! ```

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during state operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// State structure is invalid (e.g., not an object when expected)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reducer encountered incompatible types or failed to merge
    #[error("Reducer error: {0}")]
    ReducerError(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Trait for merging a partial update into a field's accumulated value.
///
/// Reducers must be deterministic and, for fields written by concurrent
/// branches, order-independent over the writer patterns the graph actually
/// produces. Replaying a committed update must be a fixpoint:
/// `reduce(reduce(a, x), x) == reduce(a, x)`.
pub trait Reducer: Send + Sync {
    /// Merge `update` into `current` (which may be `Null` before first write).
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &str;
}

/// First write sticks; the field is immutable afterwards.
///
/// Used for session identity fields (ticker, trade date) which must never
/// change after the session is created.
#[derive(Debug, Clone)]
pub struct PinnedReducer;

impl Reducer for PinnedReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match current {
            Value::Null => Ok(update.clone()),
            Value::String(s) if s.is_empty() => Ok(update.clone()),
            _ => Ok(current.clone()),
        }
    }

    fn name(&self) -> &str {
        "pinned"
    }
}

/// First non-empty string wins; later writes are ignored.
///
/// This gives every report field assign-at-most-once semantics per session,
/// which makes downstream stages monotone and idempotent even when two
/// branches race to produce the same section.
#[derive(Debug, Clone)]
pub struct FirstNonEmptyReducer;

impl Reducer for FirstNonEmptyReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        let current_filled = matches!(current, Value::String(s) if !s.is_empty());
        if current_filled {
            return Ok(current.clone());
        }
        match update {
            Value::String(_) => Ok(update.clone()),
            Value::Null => Ok(current.clone()),
            other => Err(StateError::ReducerError(format!(
                "FirstNonEmptyReducer requires string updates, got {}",
                type_name(other)
            ))),
        }
    }

    fn name(&self) -> &str {
        "first_non_empty"
    }
}

/// Appends the update to the accumulated array.
///
/// Message channels are append-only: an array update extends the channel, a
/// single value is pushed as one element.
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr), Value::Array(upd)) => {
                let mut merged = curr.clone();
                merged.extend_from_slice(upd);
                Ok(Value::Array(merged))
            }
            (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
            (Value::Array(curr), single) => {
                let mut merged = curr.clone();
                merged.push(single.clone());
                Ok(Value::Array(merged))
            }
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            _ => Err(StateError::ReducerError(
                "AppendReducer requires array values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Keeps the numeric maximum of the accumulated and incoming values.
///
/// Round counters are non-decreasing; taking the max keeps them consistent
/// when two branches report different observed counts.
#[derive(Debug, Clone)]
pub struct MaxReducer;

impl Reducer for MaxReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Number(a), Value::Number(b)) => {
                let a = a.as_i64().unwrap_or(i64::MIN);
                let b = b.as_i64().unwrap_or(i64::MIN);
                Ok(Value::Number(a.max(b).into()))
            }
            (Value::Null, Value::Number(_)) => Ok(update.clone()),
            _ => Err(StateError::ReducerError(
                "MaxReducer requires numeric values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "max"
    }
}

/// Last write wins. Default for fields without an explicit reducer.
#[derive(Debug, Clone)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Field-name → reducer mapping; the single gateway for state mutation.
#[derive(Default)]
pub struct StateSchema {
    fields: HashMap<String, Box<dyn Reducer>>,
    default_reducer: Option<Box<dyn Reducer>>,
}

impl StateSchema {
    /// Create a new empty state schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field with a specific reducer.
    pub fn add_field(&mut self, field_name: impl Into<String>, reducer: Box<dyn Reducer>) {
        self.fields.insert(field_name.into(), reducer);
    }

    /// Set the reducer used for fields without an explicit registration.
    pub fn with_default_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.default_reducer = Some(reducer);
        self
    }

    fn get_reducer(&self, field_name: &str) -> Option<&dyn Reducer> {
        self.fields
            .get(field_name)
            .map(|r| r.as_ref())
            .or_else(|| self.default_reducer.as_ref().map(|r| r.as_ref()))
    }

    /// Apply a partial update to the state, field by field, through the
    /// registered reducers. Fields without a reducer are overwritten.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("State must be an object".to_string()))?;

        let update_obj = update
            .as_object()
            .ok_or_else(|| StateError::InvalidState("Update must be an object".to_string()))?;

        for (field_name, update_value) in update_obj {
            let current_value = state_obj.get(field_name).cloned().unwrap_or(Value::Null);

            let reduced = if let Some(reducer) = self.get_reducer(field_name) {
                reducer.reduce(&current_value, update_value)?
            } else {
                update_value.clone()
            };

            state_obj.insert(field_name.clone(), reduced);
        }

        Ok(())
    }

    /// Validate that a value is usable as engine state.
    pub fn validate(&self, state: &Value) -> Result<()> {
        if !state.is_object() {
            return Err(StateError::InvalidState(
                "State must be an object".to_string(),
            ));
        }
        Ok(())
    }

    /// Names of all explicitly registered fields.
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}
