use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use crate::errors::CoreError;
use crate::utils::new_document_id;

use super::query::{path_value, Filter, Query, UpdateOp};
use super::DocumentStore;

// ============================================================================
// In-Memory Document Store
// ============================================================================
//
// Collections of JSON documents guarded by one RwLock. Writes take the
// write lock for the whole match-and-mutate step, which is exactly the
// atomic conditional-update guarantee `update_where` promises. No await
// points are held across the lock.
//
// ============================================================================

type Collections = HashMap<String, BTreeMap<String, Value>>;

pub struct MemoryStore {
    collections: RwLock<Collections>,
    sequences: Mutex<HashMap<String, i64>>,
    unique_indexes: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            sequences: Mutex::new(HashMap::new()),
            unique_indexes: HashMap::new(),
        }
    }

    /// Declare a unique index. Inserts and updates violating it fail with
    /// Conflict. Must be called before the store is shared.
    pub fn unique_index(mut self, collection: &str, field: &str) -> Self {
        self.unique_indexes
            .entry(collection.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    fn check_unique(
        &self,
        collection: &str,
        docs: &BTreeMap<String, Value>,
        candidate: &Value,
        exclude_id: Option<&str>,
    ) -> Result<(), CoreError> {
        let Some(fields) = self.unique_indexes.get(collection) else {
            return Ok(());
        };
        for field in fields {
            let Some(value) = path_value(candidate, field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let taken = docs.iter().any(|(id, existing)| {
                exclude_id != Some(id.as_str())
                    && path_value(existing, field).map(|v| v == value).unwrap_or(false)
            });
            if taken {
                return Err(CoreError::Conflict {
                    collection: collection.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn poisoned(what: &str) -> CoreError {
        CoreError::internal(format!("store lock poisoned during {}", what))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, mut doc: Value) -> Result<String, CoreError> {
        if !doc.is_object() {
            return Err(CoreError::validation("documents must be JSON objects"));
        }

        let mut all = self
            .collections
            .write()
            .map_err(|_| Self::poisoned("insert"))?;
        let docs = all.entry(collection.to_string()).or_default();

        let id = match doc.get("_id").and_then(Value::as_str) {
            Some(existing) => existing.to_string(),
            None => {
                let id = new_document_id();
                if let Some(map) = doc.as_object_mut() {
                    map.insert("_id".to_string(), Value::from(id.clone()));
                }
                id
            }
        };

        if docs.contains_key(&id) {
            return Err(CoreError::Conflict {
                collection: collection.to_string(),
                field: "_id".to_string(),
            });
        }
        self.check_unique(collection, docs, &doc, None)?;

        docs.insert(id.clone(), doc);
        tracing::debug!(collection = collection, id = %id, "document inserted");
        Ok(id)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, CoreError> {
        let all = self
            .collections
            .read()
            .map_err(|_| Self::poisoned("find_by_id"))?;
        Ok(all
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn find(&self, collection: &str, query: Query) -> Result<Vec<Value>, CoreError> {
        let all = self
            .collections
            .read()
            .map_err(|_| Self::poisoned("find"))?;
        let docs: Vec<Value> = all
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        Ok(query.apply(docs))
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        ops: Vec<UpdateOp>,
    ) -> Result<u64, CoreError> {
        self.update_where(
            collection,
            Filter::Eq("_id".to_string(), Value::from(id)),
            ops,
        )
        .await
    }

    async fn update_where(
        &self,
        collection: &str,
        filter: Filter,
        ops: Vec<UpdateOp>,
    ) -> Result<u64, CoreError> {
        let mut all = self
            .collections
            .write()
            .map_err(|_| Self::poisoned("update_where"))?;
        let Some(docs) = all.get_mut(collection) else {
            return Ok(0);
        };

        let matched: Vec<String> = docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(id, _)| id.clone())
            .collect();

        // Validate unique indexes against the post-mutation shape before
        // touching anything, so a conflicting update mutates nothing.
        let touches_indexed = self
            .unique_indexes
            .get(collection)
            .map(|fields| {
                ops.iter().any(|op| match op {
                    UpdateOp::Set(f, _) | UpdateOp::Inc(f, _) | UpdateOp::Push(f, _) => {
                        fields.contains(f)
                    }
                })
            })
            .unwrap_or(false);
        if touches_indexed {
            let snapshot = docs.clone();
            for id in &matched {
                let mut candidate = snapshot
                    .get(id)
                    .cloned()
                    .ok_or_else(|| CoreError::internal("matched document vanished"))?;
                UpdateOp::apply_all(&mut candidate, &ops);
                self.check_unique(collection, &snapshot, &candidate, Some(id))?;
            }
        }

        for id in &matched {
            if let Some(doc) = docs.get_mut(id) {
                UpdateOp::apply_all(doc, &ops);
            }
        }

        Ok(matched.len() as u64)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, CoreError> {
        let mut all = self
            .collections
            .write()
            .map_err(|_| Self::poisoned("remove"))?;
        Ok(all
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, CoreError> {
        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| Self::poisoned("next_sequence"))?;
        let counter = sequences.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
