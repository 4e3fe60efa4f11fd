//! Schemaless document bodies and typed field access.
//!
//! A `Document` is a flat JSON object. Timestamps are stored as epoch
//! milliseconds so that range filters and ordering stay numeric.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, StoreError};

/// A document body: field name to JSON value.
pub type Document = serde_json::Map<String, Value>;

/// A document together with its id, as returned by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Document,
}

/// Encode a serializable value as a document body.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            use serde::ser::Error as _;
            Err(StoreError::Serde(serde_json::Error::custom(format!(
                "expected a JSON object, got {other}"
            ))))
        }
    }
}

/// Decode a document body into a typed value.
pub fn from_document<T: DeserializeOwned>(body: &Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(body.clone()))?)
}

/// Shallow-merge `patch` into `target`, overwriting existing fields.
pub fn merge(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Typed accessors over document fields.
pub trait DocumentExt {
    fn str_field(&self, key: &str) -> Option<&str>;
    fn i64_field(&self, key: &str) -> Option<i64>;
    fn u32_field(&self, key: &str) -> Option<u32>;
    fn bool_field(&self, key: &str) -> Option<bool>;
    fn time_field(&self, key: &str) -> Option<DateTime<Utc>>;
}

impl DocumentExt for Document {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn i64_field(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn u32_field(&self, key: &str) -> Option<u32> {
        self.i64_field(key).and_then(|n| u32::try_from(n).ok())
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn time_field(&self, key: &str) -> Option<DateTime<Utc>> {
        self.i64_field(key).and_then(DateTime::from_timestamp_millis)
    }
}
