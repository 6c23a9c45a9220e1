//! Boundary with the host's script engine
//!
//! Component properties that can be computed per message are
//! [`DynamicValue`]s. The host evaluates them through a [`ScriptEngine`]; the
//! coercer only ever sees the unwrapped [`Value`].

use std::fmt;

use crate::config::is_blank;
use crate::value::Value;
use crate::Result;

/// A message flowing through the host runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    payload: Value,
}

impl Message {
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// A message with a null payload
    pub fn empty() -> Self {
        Self {
            payload: Value::Null,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// A component property holding an optional script expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicValue {
    expression: Option<String>,
}

impl DynamicValue {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
        }
    }

    /// No expression configured
    pub fn none() -> Self {
        Self::default()
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// True when no expression, or only whitespace, is configured
    pub fn is_blank(&self) -> bool {
        self.expression.as_deref().map_or(true, is_blank)
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expression {
            Some(expression) => write!(f, "{}", expression),
            None => write!(f, "null"),
        }
    }
}

/// Evaluates dynamic properties against a message
pub trait ScriptEngine: Send + Sync {
    /// Evaluate `value` for `message`.
    ///
    /// `Ok(None)` means the expression produced no value.
    fn evaluate(&self, value: &DynamicValue, message: &Message) -> Result<Option<Value>>;
}

impl<F> ScriptEngine for F
where
    F: Fn(&DynamicValue, &Message) -> Result<Option<Value>> + Send + Sync,
{
    fn evaluate(&self, value: &DynamicValue, message: &Message) -> Result<Option<Value>> {
        self(value, message)
    }
}

/// Evaluate `value`, falling back to the message payload when the property
/// is blank.
///
/// Returns `Ok(None)` only when a configured expression produced nothing.
pub fn evaluate_or_payload(
    engine: &dyn ScriptEngine,
    value: &DynamicValue,
    message: &Message,
) -> Result<Option<Value>> {
    if value.is_blank() {
        return Ok(Some(message.payload().clone()));
    }
    engine.evaluate(value, message)
}
