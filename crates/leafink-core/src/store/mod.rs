//! Replicated document store abstraction.
//!
//! Pages are persisted as small documents addressed by
//! `{collection}/{book}/pages/{page}`. The store pushes the latest version
//! of a document to every subscriber whenever it changes.

mod memory;

pub use memory::MemoryDocumentStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Nested arrays are not supported (at {path})")]
    NestedArray { path: String },
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Address of one page document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub book: String,
    pub page: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, book: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            book: book.into(),
            page: page.into(),
        }
    }

    /// Slash-separated document path.
    pub fn path(&self) -> String {
        format!("{}/{}/pages/{}", self.collection, self.book, self.page)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A value the store can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value. Non-finite numbers become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            // Whole numbers come back as integers so typed fields (u8, u32)
            // deserialize from them.
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                Value::from(*n as i64)
            }
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Array(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => FieldValue::Array(items.into_iter().map(FieldValue::from).collect()),
            Value::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Top-level fields of a document.
pub type Fields = BTreeMap<String, FieldValue>;

/// Reject arrays nested directly inside arrays, which the store cannot hold.
pub fn validate_fields(fields: &Fields) -> StoreResult<()> {
    fields
        .iter()
        .try_for_each(|(name, value)| validate_value(value, name, false))
}

fn validate_value(value: &FieldValue, path: &str, in_array: bool) -> StoreResult<()> {
    match value {
        FieldValue::Array(items) => {
            if in_array {
                return Err(StoreError::NestedArray {
                    path: path.to_string(),
                });
            }
            items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| validate_value(item, &format!("{path}[{i}]"), true))
        }
        FieldValue::Map(map) => map
            .iter()
            .try_for_each(|(k, v)| validate_value(v, &format!("{path}.{k}"), false)),
        _ => Ok(()),
    }
}

/// Callback receiving the latest document fields.
pub type Listener = Box<dyn FnMut(&Fields)>;

/// Handle for an active subscription. Dropping it stops delivery.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop delivery now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A replicated document store.
///
/// Sessions run on a single UI thread, so implementations need not be
/// `Send` or `Sync`.
pub trait DocumentStore {
    /// Register for changes to a document. The current version, if any, is
    /// delivered as well.
    fn subscribe(&self, key: &DocumentKey, listener: Listener) -> StoreResult<Subscription>;

    /// Write fields. With `merge`, fields not mentioned are kept.
    fn write(&self, key: &DocumentKey, fields: Fields, merge: bool) -> StoreResult<()>;
}
