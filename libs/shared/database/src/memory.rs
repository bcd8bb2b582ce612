use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{matches, Document, DocumentStore, Predicate, StoreError};

/// In-memory `DocumentStore` used by tests and local development. All writes
/// happen under a single lock, so `guarded_update` and `batch_update` are
/// genuinely atomic.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge(target: &mut Value, patch: &Value) {
        if let (Some(target_map), Some(patch_map)) = (target.as_object_mut(), patch.as_object()) {
            for (key, value) in patch_map {
                target_map.insert(key.clone(), value.clone());
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document { id: id.to_string(), data: data.clone() }))
    }

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut results = Vec::new();
        if let Some(docs) = collections.get(collection) {
            for (id, data) in docs {
                if matches(data, predicates) {
                    results.push(Document { id: id.clone(), data: data.clone() });
                    if limit.is_some_and(|max| results.len() >= max) {
                        break;
                    }
                }
            }
        }
        Ok(results)
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(doc) => Self::merge(doc, &data),
            None => {
                docs.insert(id.to_string(), data);
            }
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(collection.to_string(), id.to_string()))?;
        Self::merge(doc, &patch);
        Ok(())
    }

    async fn guarded_update(
        &self,
        collection: &str,
        id: &str,
        guard: &[Predicate],
        patch: Value,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let doc = match collections.get_mut(collection).and_then(|docs| docs.get_mut(id)) {
            Some(doc) => doc,
            None => return Ok(false),
        };
        if !matches(doc, guard) {
            return Ok(false);
        }
        Self::merge(doc, &patch);
        Ok(true)
    }

    async fn batch_update(&self, updates: Vec<(String, String, Value)>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        for (collection, id, _) in &updates {
            if collections.get(collection).map_or(true, |docs| !docs.contains_key(id)) {
                return Err(StoreError::NotFound(collection.clone(), id.clone()));
            }
        }
        for (collection, id, patch) in updates {
            if let Some(doc) = collections.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) {
                Self::merge(doc, &patch);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
