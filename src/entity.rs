use serde_json::Value;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::store::{parse_projection, parse_sort, DocumentStore, Filter, Query, UpdateOp};

// ============================================================================
// Generic Entity Service - Query Engine
// ============================================================================
//
// One service per entity type, all composed over the same DocumentStore
// capability. Caller-supplied filter/sort payloads are compiled into the
// closed predicate set; anything outside it is rejected up front rather
// than forwarded to the store.
//
// ============================================================================

/// Static description of an entity: where it lives and which of its text
/// fields participate in free-text search.
#[derive(Debug, Clone, Copy)]
pub struct EntityDescriptor {
    pub collection: &'static str,
    pub searchable: &'static [&'static str],
}

pub const ORDERS: EntityDescriptor = EntityDescriptor {
    collection: "orders",
    searchable: &["order_id", "shipping_address", "shipping_city"],
};

pub const PRODUCTS: EntityDescriptor = EntityDescriptor {
    collection: "products",
    searchable: &["name"],
};

pub const USERS: EntityDescriptor = EntityDescriptor {
    collection: "users",
    searchable: &["name", "phone", "email"],
};

pub const ROLES: EntityDescriptor = EntityDescriptor {
    collection: "roles",
    searchable: &["name", "key"],
};

pub const ADDRESSES: EntityDescriptor = EntityDescriptor {
    collection: "addresses",
    searchable: &["address", "city", "pincode"],
};

/// Raw list-endpoint inputs, exactly as the boundary hands them over.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub filter: Option<Value>,
    pub search: Option<String>,
    pub sort: Option<Value>,
    pub select: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

pub struct EntityService {
    store: Arc<dyn DocumentStore>,
    descriptor: EntityDescriptor,
}

impl EntityService {
    pub fn new(store: Arc<dyn DocumentStore>, descriptor: EntityDescriptor) -> Self {
        Self { store, descriptor }
    }

    pub async fn create(&self, doc: Value) -> Result<Value, CoreError> {
        let id = self.store.insert(self.descriptor.collection, doc).await?;
        tracing::info!(
            collection = self.descriptor.collection,
            id = %id,
            "entity created"
        );
        self.find_by_id(&id).await
    }

    pub async fn find_all(&self, params: ListParams) -> Result<Vec<Value>, CoreError> {
        let query = self.compile(params)?;
        self.store.find(self.descriptor.collection, query).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Value, CoreError> {
        self.store
            .find_by_id(self.descriptor.collection, id)
            .await?
            .ok_or_else(|| CoreError::not_found(self.descriptor.collection))
    }

    /// Apply a flat JSON object as field sets. Non-object payloads are
    /// Validation errors; unknown ids are NotFound.
    pub async fn update(&self, id: &str, changes: Value) -> Result<Value, CoreError> {
        let obj = changes
            .as_object()
            .ok_or_else(|| CoreError::validation("update payload must be a JSON object"))?;

        let ops: Vec<UpdateOp> = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "_id")
            .map(|(k, v)| UpdateOp::set(k.clone(), v.clone()))
            .collect();

        let matched = self
            .store
            .update_by_id(self.descriptor.collection, id, ops)
            .await?;
        if matched == 0 {
            return Err(CoreError::not_found(self.descriptor.collection));
        }
        self.find_by_id(id).await
    }

    pub async fn remove(&self, id: &str) -> Result<(), CoreError> {
        let removed = self.store.remove(self.descriptor.collection, id).await?;
        if !removed {
            return Err(CoreError::not_found(self.descriptor.collection));
        }
        tracing::info!(
            collection = self.descriptor.collection,
            id = %id,
            "entity removed"
        );
        Ok(())
    }

    /// Field-projection listing: `"name,price"` keeps those fields plus `_id`.
    pub async fn select(
        &self,
        fields: &str,
        filter: Option<Value>,
    ) -> Result<Vec<Value>, CoreError> {
        self.find_all(ListParams {
            filter,
            select: Some(fields.to_string()),
            ..ListParams::default()
        })
        .await
    }

    /// Bearer-token validator: strips an optional `Bearer ` prefix and
    /// resolves the token to a user document. Token issuance lives at the
    /// boundary; the core only proves the token maps to a known user.
    pub async fn check_token(&self, header: Option<&str>) -> Result<Value, CoreError> {
        let raw = header.ok_or_else(|| CoreError::Unauthorized("missing bearer token".into()))?;
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if token.is_empty() {
            return Err(CoreError::Unauthorized("empty bearer token".into()));
        }

        let users = self
            .store
            .find(
                "users",
                Query::with_filter(Filter::Eq("token".to_string(), Value::from(token))),
            )
            .await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Unauthorized("unknown bearer token".into()))
    }

    fn compile(&self, params: ListParams) -> Result<Query, CoreError> {
        let mut clauses = Vec::new();

        if let Some(raw) = &params.filter {
            clauses.push(Filter::parse(raw)?);
        }

        // Search is OR'd across the entity's searchable fields and then
        // AND'd with the structured filter.
        if let Some(term) = params.search.as_deref().map(str::trim) {
            if !term.is_empty() && !self.descriptor.searchable.is_empty() {
                let arms = self
                    .descriptor
                    .searchable
                    .iter()
                    .map(|field| Filter::Contains(field.to_string(), term.to_string()))
                    .collect();
                clauses.push(Filter::Or(arms));
            }
        }

        let filter = match clauses.len() {
            0 => None,
            1 => clauses.into_iter().next(),
            _ => Some(Filter::And(clauses)),
        };

        let sort = match &params.sort {
            Some(raw) => parse_sort(raw)?,
            None => Vec::new(),
        };

        Ok(Query {
            filter,
            sort,
            skip: params.skip,
            limit: params.limit,
            projection: params.select.as_deref().map(parse_projection),
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn orders_service() -> EntityService {
        let store = Arc::new(MemoryStore::new());
        EntityService::new(store, ORDERS)
    }

    #[tokio::test]
    async fn test_filter_and_search_combine_with_and() {
        let svc = orders_service();
        svc.create(json!({"status": "pending", "shipping_address": "Sector 18, Noida"}))
            .await
            .unwrap();
        svc.create(json!({"status": "confirmed", "shipping_address": "Noida Extension"}))
            .await
            .unwrap();
        svc.create(json!({"status": "pending", "shipping_address": "Gurgaon"}))
            .await
            .unwrap();

        let out = svc
            .find_all(ListParams {
                filter: Some(json!({"status": "pending"})),
                search: Some("noida".to_string()),
                ..ListParams::default()
            })
            .await
            .unwrap();

        // AND of the two predicates, not the OR
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["status"], "pending");
        assert_eq!(out[0]["shipping_address"], "Sector 18, Noida");
    }

    #[tokio::test]
    async fn test_malformed_filter_is_rejected() {
        let svc = orders_service();
        let err = svc
            .find_all(ListParams {
                filter: Some(json!({"status": {"$where": "true"}})),
                ..ListParams::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = svc
            .find_all(ListParams {
                sort: Some(json!("newest first")),
                ..ListParams::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_crud_round_trip_and_not_found() {
        let svc = orders_service();
        let created = svc
            .create(json!({"status": "pending", "total_amount": 120}))
            .await
            .unwrap();
        let id = created["_id"].as_str().unwrap().to_string();

        let updated = svc.update(&id, json!({"total_amount": 150})).await.unwrap();
        assert_eq!(updated["total_amount"], 150);
        assert_eq!(updated["status"], "pending");

        assert!(matches!(
            svc.update("ffffffffffffffffffffffff", json!({"a": 1}))
                .await
                .unwrap_err(),
            CoreError::NotFound(_)
        ));
        assert!(matches!(
            svc.update(&id, json!("not an object")).await.unwrap_err(),
            CoreError::Validation(_)
        ));

        svc.remove(&id).await.unwrap();
        assert!(matches!(
            svc.find_by_id(&id).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_select_projects_fields() {
        let store = Arc::new(MemoryStore::new());
        let svc = EntityService::new(store, PRODUCTS);
        svc.create(json!({"name": "rice", "price": 50, "mrp": 60, "stock": 10}))
            .await
            .unwrap();

        let out = svc.select("name,price", None).await.unwrap();
        assert_eq!(out.len(), 1);
        let doc = out[0].as_object().unwrap();
        assert!(doc.contains_key("name"));
        assert!(doc.contains_key("price"));
        assert!(doc.contains_key("_id"));
        assert!(!doc.contains_key("stock"));
    }

    #[tokio::test]
    async fn test_check_token() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        store
            .insert("users", json!({"name": "asha", "token": "tok-123"}))
            .await
            .unwrap();
        let svc = EntityService::new(store, USERS);

        let user = svc.check_token(Some("Bearer tok-123")).await.unwrap();
        assert_eq!(user["name"], "asha");

        // Raw token without the scheme prefix also resolves
        let user = svc.check_token(Some("tok-123")).await.unwrap();
        assert_eq!(user["name"], "asha");

        assert!(matches!(
            svc.check_token(None).await.unwrap_err(),
            CoreError::Unauthorized(_)
        ));
        assert!(matches!(
            svc.check_token(Some("Bearer ")).await.unwrap_err(),
            CoreError::Unauthorized(_)
        ));
        assert!(matches!(
            svc.check_token(Some("Bearer nope")).await.unwrap_err(),
            CoreError::Unauthorized(_)
        ));
    }
}
