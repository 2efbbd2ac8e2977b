//! The value store: resolved variable names for one task run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutable mapping of resolved variable names to values for one task run.
///
/// Seeded from caller-supplied defaults and arguments; mutated only by the
/// prompt resolver and by action side-channel callbacks. Template rendering
/// and path resolution read it through [`ValueStore::context`].
///
/// Keys are kept ordered so prompt skipping and rendering are
/// deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueStore {
    values: BTreeMap<String, Value>,
}

impl ValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Get a value coerced to its string form, if it has one.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Set a value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Whether the store holds a non-empty value for `name`.
    ///
    /// `null`, the empty string, and empty arrays/objects count as empty;
    /// a prompt whose name already has a non-empty value is never re-asked.
    pub fn has_non_empty(&self, name: &str) -> bool {
        self.values.get(name).map(is_non_empty).unwrap_or(false)
    }

    /// Merge entries from `other`, keeping existing values on collision.
    pub fn merge_defaults(&mut self, other: &ValueStore) {
        for (key, value) in &other.values {
            self.values.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Snapshot the store as a JSON object for template rendering.
    pub fn context(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ValueStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}
