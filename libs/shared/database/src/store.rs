use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}/{1}")]
    NotFound(String, String),

    #[error("Store request failed: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A raw document as returned by the store: its assigned id plus the data map.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// A typed document together with its store-assigned id. Serializes flat, so
/// API responses carry `{"id": ..., ...fields}` the way the store hands them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    Lte(String, Value),
    Gte(String, Value),
    In(String, Vec<Value>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.to_string(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Lte(field.to_string(), value.into())
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Gte(field.to_string(), value.into())
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Self {
        Predicate::In(field.to_string(), values)
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq(f, _) | Predicate::Lte(f, _) | Predicate::Gte(f, _) | Predicate::In(f, _) => f,
        }
    }
}

/// Eventually-consistent key/value document store with predicate queries and
/// per-document read-modify-write. `guarded_update` is the single atomic
/// compare-and-set primitive: it applies the patch only when the guard
/// predicates still hold, and at most one concurrent caller wins.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Merge-write at a caller-chosen id, creating the document if absent.
    /// Used for singleton documents such as process settings.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Shallow merge of the patch's top-level fields into the document.
    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    /// Apply the patch only if the document exists and every guard predicate
    /// matches its current contents. Returns whether the patch was applied.
    async fn guarded_update(
        &self,
        collection: &str,
        id: &str,
        guard: &[Predicate],
        patch: Value,
    ) -> Result<bool, StoreError>;

    /// Apply a list of (collection, id, patch) merges atomically per call.
    async fn batch_update(&self, updates: Vec<(String, String, Value)>) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Evaluate predicates against a document's data map. Missing fields never match.
pub fn matches(data: &Value, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|p| {
        let current = match data.get(p.field()) {
            Some(v) => v,
            None => return false,
        };
        match p {
            Predicate::Eq(_, expected) => current == expected,
            Predicate::Lte(_, bound) => {
                matches!(compare_values(current, bound), Some(Ordering::Less | Ordering::Equal))
            }
            Predicate::Gte(_, bound) => {
                matches!(compare_values(current, bound), Some(Ordering::Greater | Ordering::Equal))
            }
            Predicate::In(_, allowed) => allowed.contains(current),
        }
    })
}

/// Order two scalar values. Strings that both parse as RFC 3339 timestamps are
/// compared as instants, so mixed-precision ISO strings order chronologically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => match (parse_instant(x), parse_instant(y)) {
            (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
            _ => Some(x.cmp(y)),
        },
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        _ => None,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamp_strings_compare_chronologically() {
        let earlier = json!("2025-08-28T10:00:00.123Z");
        let later = json!("2025-08-28T10:00:00Z");
        // Lexicographically '.' < 'Z' would invert this.
        assert_eq!(compare_values(&earlier, &later), Some(Ordering::Greater));
    }

    #[test]
    fn matches_requires_all_predicates() {
        let doc = json!({ "status": "queued", "attempts": 2 });
        assert!(matches(&doc, &[Predicate::eq("status", "queued")]));
        assert!(!matches(
            &doc,
            &[Predicate::eq("status", "queued"), Predicate::eq("attempts", 3)]
        ));
    }

    #[test]
    fn missing_field_never_matches() {
        let doc = json!({ "status": "queued" });
        assert!(!matches(&doc, &[Predicate::lte("sendAt", json!("2025-01-01T00:00:00Z"))]));
    }

    #[test]
    fn set_membership() {
        let doc = json!({ "status": "processing" });
        let p = Predicate::is_in("status", vec![json!("queued"), json!("processing")]);
        assert!(matches(&doc, &[p]));
    }
}
