use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::metrics::Metrics;
use crate::store::{DocumentStore, Filter, UpdateOp};

// ============================================================================
// Inventory Guard
// ============================================================================
//
// The only writer of Product.stock. A decrement is one conditional update
// matching {_id, stock >= qty} applying stock -= qty; precondition and
// mutation commit atomically, so stock never goes negative no matter how
// many creations race on the same product.
//
// ============================================================================

pub struct InventoryGuard {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl InventoryGuard {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Atomically take `qty` units off the shelf. Zero matches means the
    /// precondition failed; a re-fetch distinguishes a missing product
    /// from insufficient stock.
    pub async fn decrement_stock(&self, product_id: &str, qty: i64) -> Result<(), CoreError> {
        if qty <= 0 {
            return Err(CoreError::validation("quantity must be positive"));
        }

        let filter = Filter::And(vec![
            Filter::Eq("_id".to_string(), json!(product_id)),
            Filter::Gte("stock".to_string(), json!(qty)),
        ]);
        let matched = self
            .store
            .update_where("products", filter, vec![UpdateOp::inc("stock", -qty)])
            .await?;

        if matched == 0 {
            return match self.store.find_by_id("products", product_id).await? {
                None => Err(CoreError::not_found("product")),
                Some(product) => {
                    let available = product.get("stock").and_then(Value::as_i64).unwrap_or(0);
                    self.metrics.stock_conflicts.inc();
                    tracing::warn!(
                        product_id = %product_id,
                        requested = qty,
                        available = available,
                        "decrement refused, insufficient stock"
                    );
                    Err(CoreError::InsufficientStock {
                        product_id: product_id.to_string(),
                        requested: qty,
                        available,
                    })
                }
            };
        }

        self.metrics.stock_decrements.inc();
        tracing::debug!(product_id = %product_id, qty = qty, "stock decremented");
        Ok(())
    }

    /// Unconditional restock. Used by the order-creation compensation log
    /// and by explicit restocking; cancellation does not call this.
    pub async fn increment_stock(&self, product_id: &str, qty: i64) -> Result<(), CoreError> {
        if qty <= 0 {
            return Err(CoreError::validation("quantity must be positive"));
        }

        let matched = self
            .store
            .update_by_id("products", product_id, vec![UpdateOp::inc("stock", qty)])
            .await?;
        if matched == 0 {
            return Err(CoreError::not_found("product"));
        }

        tracing::debug!(product_id = %product_id, qty = qty, "stock incremented");
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
