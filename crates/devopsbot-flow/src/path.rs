//! `$`-rooted dotted paths into a JSON state document.

use std::fmt;

use devopsbot_core::BotError;
use serde_json::{Map, Value};

/// A path such as `$`, `$.proceed`, or `$.reportResult.markdown`.
///
/// # Examples
///
/// ```
/// use devopsbot_flow::path::JsonPath;
/// use serde_json::json;
///
/// let path = JsonPath::parse("$.payload.taskKey").unwrap();
/// let state = json!({"payload": {"taskKey": "OPS-1"}});
/// assert_eq!(path.select(&state).unwrap(), json!("OPS-1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    /// The whole document.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Workflow`] unless the path is `$` or `$.` followed
    /// by non-empty dot-separated field names.
    pub fn parse(expr: &str) -> Result<Self, BotError> {
        let invalid = || BotError::Workflow(format!("invalid path '{expr}'"));
        let rest = expr.strip_prefix('$').ok_or_else(invalid)?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(invalid());
        }
        Ok(Self { segments })
    }

    /// Whether this path addresses the whole document.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Return a copy of the value at this path.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Workflow`] if any segment is missing.
    pub fn select(&self, state: &Value) -> Result<Value, BotError> {
        let mut current = state;
        for segment in &self.segments {
            current = current.get(segment).ok_or_else(|| {
                BotError::Workflow(format!("path {self} not found in state"))
            })?;
        }
        Ok(current.clone())
    }

    /// Write `value` at this path, creating intermediate objects as needed.
    ///
    /// Writing at the root replaces the state.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Workflow`] if an intermediate value exists but is
    /// not an object.
    pub fn insert(&self, state: Value, value: Value) -> Result<Value, BotError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(value);
        };
        let mut state = match state {
            Value::Object(_) => state,
            Value::Null => Value::Object(Map::new()),
            _ => {
                return Err(BotError::Workflow(format!(
                    "cannot write {self} into a non-object state"
                )))
            }
        };

        let mut current = &mut state;
        for segment in parents {
            let object = current.as_object_mut().ok_or_else(|| {
                BotError::Workflow(format!("cannot write {self}: {segment} is not an object"))
            })?;
            current = object
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let object = current.as_object_mut().ok_or_else(|| {
            BotError::Workflow(format!("cannot write {self}: parent is not an object"))
        })?;
        object.insert(last.clone(), value);
        Ok(state)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}
