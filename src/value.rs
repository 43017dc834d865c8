//! Resolved value domain for Modwire.
//!
//! The resolver works over a deliberately small value domain: scalar strings
//! and ordered lists of scalar strings. Everything richer (resource payloads)
//! is carried as opaque YAML and never enters this domain.

use serde::{Deserialize, Serialize};

/// A resolved configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A single scalar, stored as its string form.
    Scalar(String),
    /// An ordered list of scalars. Order is significant and preserved.
    List(Vec<String>),
}

impl Value {
    /// Creates a scalar value.
    pub fn scalar(s: impl Into<String>) -> Self {
        Value::Scalar(s.into())
    }

    /// Creates a list value.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns the scalar content, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Returns the list content, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::Scalar(_) => None,
            Value::List(items) => Some(items),
        }
    }

    /// Element count: 1 for scalars, list length for lists.
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::List(items) => items.len(),
        }
    }

    /// True for an empty list. Scalars are never empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::List(items) if items.is_empty())
    }

    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
        }
    }

    /// Converts a YAML value into the resolver's value domain.
    ///
    /// Scalars (strings, numbers, booleans) become [`Value::Scalar`];
    /// sequences of scalars become [`Value::List`]. Mappings, nulls, and
    /// nested sequences have no representation here and return `None`.
    pub fn from_yaml(yaml: &serde_yaml::Value) -> Option<Self> {
        match yaml {
            serde_yaml::Value::String(s) => Some(Value::Scalar(s.clone())),
            serde_yaml::Value::Number(n) => Some(Value::Scalar(n.to_string())),
            serde_yaml::Value::Bool(b) => Some(Value::Scalar(b.to_string())),
            serde_yaml::Value::Sequence(seq) => {
                let mut items = Vec::with_capacity(seq.len());
                for item in seq {
                    match item {
                        serde_yaml::Value::String(s) => items.push(s.clone()),
                        serde_yaml::Value::Number(n) => items.push(n.to_string()),
                        serde_yaml::Value::Bool(b) => items.push(b.to_string()),
                        _ => return None,
                    }
                }
                Some(Value::List(items))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}
