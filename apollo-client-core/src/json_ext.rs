//! Performance oriented JSON manipulation.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extension trait for [`serde_json_bytes::Value`].
pub trait ValueExt {
    /// Returns a copy of the value where every object has its keys sorted,
    /// recursively. Two values that only differ by key order become equal.
    fn canonicalize(&self) -> Value;

    /// Merges `other` into `self`: objects key by key and lists of the same
    /// length element by element, recursively. Anything else is replaced.
    fn deep_merge(&mut self, other: Value);
}

impl ValueExt for Value {
    fn canonicalize(&self) -> Value {
        match self {
            Value::Object(object) => {
                let mut entries: Vec<(&ByteString, &Value)> = object.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
                Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.clone(), value.canonicalize()))
                        .collect(),
                )
            }
            Value::Array(values) => Value::Array(values.iter().map(|v| v.canonicalize()).collect()),
            other => other.clone(),
        }
    }

    fn deep_merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Object(object), Value::Object(other)) => {
                for (key, value) in other {
                    match object.get_mut(&key) {
                        Some(existing) => existing.deep_merge(value),
                        None => {
                            object.insert(key, value);
                        }
                    }
                }
            }
            (Value::Array(values), Value::Array(others)) if values.len() == others.len() => {
                for (value, other) in values.iter_mut().zip(others) {
                    value.deep_merge(other);
                }
            }
            (this, other) => *this = other,
        }
    }
}

/// One step of a [`Path`] into a response.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index into a list.
    Index(usize),

    /// A response key (alias or field name).
    Key(String),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Index(index) => write!(f, "{index}"),
            PathElement::Key(key) => f.write_str(key),
        }
    }
}

/// A path into the result of a query, used to locate missing fields and
/// GraphQL errors.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Path {
        Path(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn join(&self, element: impl Into<PathElement>) -> Path {
        let mut elements = self.0.clone();
        elements.push(element.into());
        Path(elements)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

impl<T> From<Vec<T>> for Path
where
    T: Into<PathElement>,
{
    fn from(elements: Vec<T>) -> Self {
        Path(elements.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in self.iter() {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}
