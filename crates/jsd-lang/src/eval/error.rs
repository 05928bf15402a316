use thiserror::Error;

use super::runtime_value::{ObjectRef, Value};
use crate::range::Position;

/// A value thrown by a script, together with where it was raised.
#[derive(Error, Debug, Clone)]
#[error("{value}")]
pub struct EvalError {
    pub value: Value,
    pub position: Position,
}

impl EvalError {
    pub fn thrown(value: Value, position: Position) -> Self {
        Self { value, position }
    }

    fn builtin(name: &str, message: impl Into<String>, position: Position) -> Self {
        Self::thrown(Value::Object(ObjectRef::error(name, message)), position)
    }

    pub fn type_error(message: impl Into<String>, position: Position) -> Self {
        Self::builtin("TypeError", message, position)
    }

    pub fn reference_error(message: impl Into<String>, position: Position) -> Self {
        Self::builtin("ReferenceError", message, position)
    }

    pub fn range_error(message: impl Into<String>, position: Position) -> Self {
        Self::builtin("RangeError", message, position)
    }

    pub fn syntax_error(message: impl Into<String>, position: Position) -> Self {
        Self::builtin("SyntaxError", message, position)
    }
}
