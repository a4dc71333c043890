use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::domain::role::RoleResolver;
use crate::errors::CoreError;
use crate::metrics::Metrics;
use crate::store::DocumentStore;
use crate::utils::is_reference_id;

use super::model::WorkerAssignment;

// ============================================================================
// Order View Builder
// ============================================================================
//
// Projects a persisted order into its external shape:
// - user/address references populate into flat `user` / `address` keys,
// - each item expands its product into top-level category/subcategory/brand
//   plus the ordered quantity (line snapshots stay frozen),
// - populated sub-records lose the leaked `id` alias,
// - picker_obj/packer_obj fall back to the empty-worker placeholder,
// - the embedded user runs through the role resolver so responses carry
//   resolved role objects, never raw codes.
//
// ============================================================================

pub struct OrderViewBuilder {
    store: Arc<dyn DocumentStore>,
    resolver: RoleResolver,
}

impl OrderViewBuilder {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        let resolver = RoleResolver::new(store.clone(), metrics);
        Self { store, resolver }
    }

    pub async fn build_by_id(&self, id: &str) -> Result<Value, CoreError> {
        let doc = self
            .store
            .find_by_id("orders", id)
            .await?
            .ok_or_else(|| CoreError::not_found("order"))?;
        self.build(doc).await
    }

    pub async fn build(&self, mut doc: Value) -> Result<Value, CoreError> {
        if !doc.is_object() {
            return Err(CoreError::internal("order document is not an object"));
        }

        // Populate the user reference and resolve its role tokens.
        let user_id = doc.get("user_id").and_then(Value::as_str).map(str::to_string);
        let user = match user_id {
            Some(uid) => match self.store.find_by_id("users", &uid).await? {
                Some(mut user) => {
                    strip_alias(&mut user);
                    self.resolver.resolve_user(&mut user).await?;
                    user
                }
                None => Value::Null,
            },
            None => Value::Null,
        };
        doc["user"] = user;

        let address_id = doc
            .get("address_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let address = match address_id {
            Some(aid) => match self.store.find_by_id("addresses", &aid).await? {
                Some(mut address) => {
                    strip_alias(&mut address);
                    address
                }
                None => Value::Null,
            },
            None => Value::Null,
        };
        doc["address"] = address;

        // Item expansion. Snapshot fields (name, image, price) stay frozen;
        // only the product's classification is lifted onto the line.
        let raw_items = doc
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut items = Vec::with_capacity(raw_items.len());
        for item in raw_items {
            items.push(self.expand_item(item).await?);
        }
        doc["items"] = Value::Array(items);

        // The shape always carries complete worker objects.
        for slot in ["picker_obj", "packer_obj"] {
            let missing = doc.get(slot).map(Value::is_null).unwrap_or(true);
            if missing {
                doc[slot] = json!(WorkerAssignment::empty());
            }
        }

        Ok(doc)
    }

    async fn expand_item(&self, item: Value) -> Result<Value, CoreError> {
        let mut view = match item {
            Value::Object(map) => map,
            other => return Ok(other),
        };

        let product_id = view
            .get("product_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let product = match product_id {
            Some(pid) => self.store.find_by_id("products", &pid).await?,
            None => None,
        };

        match product {
            Some(mut product) => {
                strip_alias(&mut product);
                let category = self.expand_ref("categories", product.get("category")).await;
                let subcategory = self
                    .expand_ref("subcategories", product.get("subcategory"))
                    .await;
                let brand = self.expand_ref("brands", product.get("brand")).await;
                view.insert("category".to_string(), category);
                view.insert("subcategory".to_string(), subcategory);
                view.insert("brand".to_string(), brand);
            }
            None => {
                // Product deleted since the order was placed; the snapshot
                // still renders, just without classification.
                view.insert("category".to_string(), Value::Null);
                view.insert("subcategory".to_string(), Value::Null);
                view.insert("brand".to_string(), Value::Null);
            }
        }

        Ok(Value::Object(view))
    }

    /// Populate a reference-looking value into its document; anything else
    /// passes through as-is.
    async fn expand_ref(&self, collection: &str, value: Option<&Value>) -> Value {
        match value {
            Some(Value::String(s)) if is_reference_id(s) => {
                match self.store.find_by_id(collection, s).await {
                    Ok(Some(mut doc)) => {
                        strip_alias(&mut doc);
                        doc
                    }
                    _ => Value::String(s.clone()),
                }
            }
            Some(v) => v.clone(),
            None => Value::Null,
        }
    }
}

/// Populated sub-records can leak an `id` alias next to `_id`; drop it.
fn strip_alias(doc: &mut Value) {
    if let Some(map) = doc.as_object_mut() {
        if map.contains_key("_id") {
            map.remove("id");
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<dyn DocumentStore>,
        view: OrderViewBuilder,
        user_id: String,
        product_id: String,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());

        store
            .insert(
                "roles",
                json!({"name": "Picker", "key": "picker", "role_id": 2, "role_type": 2}),
            )
            .await
            .unwrap();
        let category_id = store
            .insert("categories", json!({"name": "Staples", "id": "leaked-alias"}))
            .await
            .unwrap();
        let user_id = store
            .insert(
                "users",
                json!({"name": "asha", "phone": "9999999999", "role": [2], "id": "leaked-alias"}),
            )
            .await
            .unwrap();
        let product_id = store
            .insert(
                "products",
                json!({
                    "name": "Basmati Rice",
                    "price": 50.0,
                    "stock": 8,
                    "category": category_id,
                    "brand": "house-brand",
                }),
            )
            .await
            .unwrap();

        let view = OrderViewBuilder::new(store.clone(), metrics);
        Fixture {
            store,
            view,
            user_id,
            product_id,
        }
    }

    #[tokio::test]
    async fn test_view_populates_and_resolves() {
        let fx = fixture().await;
        let order_id = fx
            .store
            .insert(
                "orders",
                json!({
                    "order_id": "ORD-20260823-000001",
                    "user_id": fx.user_id,
                    "items": [{
                        "product_id": fx.product_id,
                        "name": "Basmati Rice",
                        "image": null,
                        "price": 50.0,
                        "quantity": 2,
                    }],
                    "total_amount": 100.0,
                    "status": "confirmed",
                }),
            )
            .await
            .unwrap();

        let view = fx.view.build_by_id(&order_id).await.unwrap();

        // User populated with resolved role objects, alias stripped
        assert_eq!(view["user"]["name"], "asha");
        assert_eq!(view["user"]["role"][0]["key"], "picker");
        assert!(view["user"].get("id").is_none());

        // Item expanded: classification lifted, quantity kept, snapshot intact
        let item = &view["items"][0];
        assert_eq!(item["quantity"], 2);
        assert_eq!(item["category"]["name"], "Staples");
        assert!(item["category"].get("id").is_none());
        // Non-reference brand value passes through untouched
        assert_eq!(item["brand"], "house-brand");
        assert_eq!(item["price"], 50.0);

        // Worker objects always present
        assert_eq!(view["picker_obj"]["id"], Value::Null);
        assert_eq!(view["packer_obj"]["history"], json!([]));
    }

    #[tokio::test]
    async fn test_view_survives_missing_references() {
        let fx = fixture().await;
        let order_id = fx
            .store
            .insert(
                "orders",
                json!({
                    "order_id": "ORD-20260823-000002",
                    "user_id": "ffffffffffffffffffffffff",
                    "items": [{
                        "product_id": "eeeeeeeeeeeeeeeeeeeeeeee",
                        "name": "Ghost Product",
                        "price": 10.0,
                        "quantity": 1,
                    }],
                    "total_amount": 10.0,
                    "status": "pending",
                }),
            )
            .await
            .unwrap();

        let view = fx.view.build_by_id(&order_id).await.unwrap();
        assert_eq!(view["user"], Value::Null);
        assert_eq!(view["address"], Value::Null);
        assert_eq!(view["items"][0]["name"], "Ghost Product");
        assert_eq!(view["items"][0]["category"], Value::Null);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let fx = fixture().await;
        assert!(matches!(
            fx.view.build_by_id("abcdefabcdefabcdefabcdef").await.unwrap_err(),
            CoreError::NotFound(_)
        ));
    }
}
