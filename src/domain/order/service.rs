use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::product::{InventoryGuard, Product};
use crate::domain::user::User;
use crate::errors::CoreError;
use crate::metrics::Metrics;
use crate::store::{DocumentStore, Filter, Query, UpdateOp};
use crate::utils::new_order_code;

use super::model::{
    ActorRole, CreateOrderRequest, Order, OrderItem, OrderStatus, PaymentDetails, ShiftRecord,
    StatusHistoryEntry, UpdateOrderRequest, WorkerAssignment,
};
use super::view::OrderViewBuilder;

// How many ORD-code collisions creation tolerates before giving up, and
// how many times a status write retries after losing a concurrent race.
const ORDER_CODE_ATTEMPTS: u32 = 5;
const STATUS_WRITE_ATTEMPTS: u32 = 3;

// ============================================================================
// Order Service - Lifecycle & Role-Gated State Machine
// ============================================================================
//
// Creation decrements stock through the inventory guard and keeps a
// compensation log: any failure after the first committed decrement
// re-increments everything taken so far, so a half-failed creation never
// strands stock. There is no cross-document transaction beyond that.
//
// Updates are gated by actor role; status-field writes go through the
// store's atomic conditional update so history stays append-only and
// accurate under concurrent writers.
//
// ============================================================================

pub struct OrderService {
    store: Arc<dyn DocumentStore>,
    guard: InventoryGuard,
    view: OrderViewBuilder,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        let guard = InventoryGuard::new(store.clone(), metrics.clone());
        let view = OrderViewBuilder::new(store.clone(), metrics.clone());
        Self {
            store,
            guard,
            view,
            metrics,
        }
    }

    pub fn view(&self) -> &OrderViewBuilder {
        &self.view
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub async fn create(&self, req: CreateOrderRequest) -> Result<Value, CoreError> {
        let correlation_id = Uuid::new_v4();

        if req.items.is_empty() {
            return Err(CoreError::validation("order must contain at least one item"));
        }
        for line in &req.items {
            if line.quantity <= 0 {
                return Err(CoreError::validation(format!(
                    "invalid quantity {} for product {}",
                    line.quantity, line.product_id
                )));
            }
        }

        let mut decremented: Vec<(String, i64)> = Vec::new();
        let result = self.create_inner(&req, &mut decremented, correlation_id).await;

        if result.is_err() && !decremented.is_empty() {
            self.compensate(&decremented, correlation_id).await;
        }
        result
    }

    async fn create_inner(
        &self,
        req: &CreateOrderRequest,
        decremented: &mut Vec<(String, i64)>,
        correlation_id: Uuid,
    ) -> Result<Value, CoreError> {
        let now = Utc::now();

        // Snapshot each line and take its stock. Decrements commit one at
        // a time; the caller compensates on failure.
        let mut items: Vec<OrderItem> = Vec::with_capacity(req.items.len());
        let mut total_amount = 0.0;
        for line in &req.items {
            let doc = self
                .store
                .find_by_id("products", &line.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("product"))?;
            let product: Product = serde_json::from_value(doc)
                .map_err(|e| CoreError::internal(format!("malformed product document: {}", e)))?;

            self.guard
                .decrement_stock(&line.product_id, line.quantity)
                .await?;
            decremented.push((line.product_id.clone(), line.quantity));

            total_amount += product.price * line.quantity as f64;
            items.push(OrderItem {
                product_id: line.product_id.clone(),
                name: product.name.clone(),
                image: product.primary_image().map(str::to_string),
                price: product.price,
                quantity: line.quantity,
            });
        }

        // Payment method: explicit payment object, then the legacy flat
        // field, then COD.
        let method = req
            .payment
            .as_ref()
            .map(|p| p.method.clone())
            .or_else(|| req.payment_method.clone())
            .unwrap_or_else(|| "COD".to_string());

        let status = match req.status.as_deref() {
            Some(raw) => raw.parse::<OrderStatus>()?,
            None if method.eq_ignore_ascii_case("cod") => OrderStatus::Confirmed,
            None => OrderStatus::Pending,
        };

        let payment_details = PaymentDetails {
            method,
            gateway: req.payment.as_ref().and_then(|p| p.gateway.clone()),
            currency: req.payment.as_ref().and_then(|p| p.currency.clone()),
            payable_amount: req
                .payment
                .as_ref()
                .and_then(|p| p.payable_amount)
                .or(Some(total_amount)),
            paid_amount: req.payment.as_ref().and_then(|p| p.paid_amount),
            transaction_id: req.payment.as_ref().and_then(|p| p.transaction_id.clone()),
            timestamp: Some(now),
        };

        // Worker targets resolve to denormalized snapshots; failure falls
        // back to the placeholder instead of failing the order.
        let picker_obj = self.worker_snapshot(req.picker_id.as_deref()).await;
        let packer_obj = self.worker_snapshot(req.packer_id.as_deref()).await;

        let history = vec![StatusHistoryEntry {
            status,
            timestamp: now,
            comment: "Order placed".to_string(),
        }];

        // The ORD code is random, not globally unique; retry on collision
        // against the order_id unique index.
        let mut last_err = None;
        for attempt in 1..=ORDER_CODE_ATTEMPTS {
            let order_code = new_order_code();
            let doc = json!({
                "order_id": order_code,
                "user_id": &req.user_id,
                "address_id": &req.address_id,
                "items": &items,
                "total_amount": total_amount,
                "status": status,
                "payment_details": &payment_details,
                "picker_id": &req.picker_id,
                "packer_id": &req.packer_id,
                "picker_obj": &picker_obj,
                "packer_obj": &packer_obj,
                "picker_accepted": null,
                "picker_remark": null,
                "packer_remark": null,
                "status_history": &history,
                "shipping_address": &req.shipping_address,
                "shipping_city": &req.shipping_city,
                "shipping_pincode": &req.shipping_pincode,
                "created_at": now,
                "updated_at": now,
            });

            match self.store.insert("orders", doc).await {
                Ok(id) => {
                    self.metrics.orders_created.inc();
                    tracing::info!(
                        correlation_id = %correlation_id,
                        order_id = %order_code,
                        id = %id,
                        total_amount = total_amount,
                        item_count = items.len(),
                        status = %status,
                        "order created"
                    );
                    return self.view.build_by_id(&id).await;
                }
                Err(CoreError::Conflict { ref field, .. }) if field == "order_id" => {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        order_id = %order_code,
                        attempt = attempt,
                        "order code collision, regenerating"
                    );
                    last_err = Some(CoreError::Conflict {
                        collection: "orders".to_string(),
                        field: "order_id".to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| CoreError::internal("order code generation failed")))
    }

    /// Re-increment every committed decrement of a failed creation.
    async fn compensate(&self, decremented: &[(String, i64)], correlation_id: Uuid) {
        for (product_id, qty) in decremented {
            if let Err(e) = self.guard.increment_stock(product_id, *qty).await {
                tracing::error!(
                    correlation_id = %correlation_id,
                    product_id = %product_id,
                    qty = qty,
                    error = %e,
                    "failed to compensate stock decrement"
                );
            }
        }
        tracing::warn!(
            correlation_id = %correlation_id,
            lines = decremented.len(),
            "order creation rolled back, stock restored"
        );
    }

    async fn worker_snapshot(&self, worker_id: Option<&str>) -> WorkerAssignment {
        let Some(id) = worker_id else {
            return WorkerAssignment::empty();
        };
        let user = match self.store.find_by_id("users", id).await {
            Ok(Some(doc)) => serde_json::from_value::<User>(doc).ok(),
            _ => None,
        };
        match user {
            Some(user) => WorkerAssignment {
                id: Some(user.id),
                name: user.name,
                phone: user.phone,
                accepted: None,
                remark: None,
                history: Vec::new(),
            },
            None => {
                tracing::warn!(worker_id = %id, "worker resolution failed, using placeholder");
                WorkerAssignment::empty()
            }
        }
    }

    // ------------------------------------------------------------------
    // Role-gated update
    // ------------------------------------------------------------------

    pub async fn update(
        &self,
        id: &str,
        actor_role: &str,
        req: UpdateOrderRequest,
    ) -> Result<Value, CoreError> {
        let doc = self
            .store
            .find_by_id("orders", id)
            .await?
            .ok_or_else(|| CoreError::not_found("order"))?;
        let order: Order = serde_json::from_value(doc)
            .map_err(|e| CoreError::internal(format!("malformed order document: {}", e)))?;
        let current_status = order.status;

        let role = ActorRole::parse(actor_role);
        let now = Utc::now();

        let mut ops: Vec<UpdateOp> = Vec::new();
        match role {
            ActorRole::Admin => {
                if current_status.is_locked() && req.has_content_mutation() {
                    return Err(CoreError::validation(format!(
                        "content of a {} order cannot be modified",
                        current_status
                    )));
                }
                if let Some(items) = &req.items {
                    if items.is_empty() {
                        return Err(CoreError::validation("items must not be empty"));
                    }
                    ops.push(UpdateOp::set("items", json!(items)));
                }
                if let Some(total) = req.total_amount {
                    ops.push(UpdateOp::set("total_amount", json!(total)));
                }
                if let Some(v) = &req.shipping_address {
                    ops.push(UpdateOp::set("shipping_address", json!(v)));
                }
                if let Some(v) = &req.shipping_city {
                    ops.push(UpdateOp::set("shipping_city", json!(v)));
                }
                if let Some(v) = &req.shipping_pincode {
                    ops.push(UpdateOp::set("shipping_pincode", json!(v)));
                }
                if let Some(v) = &req.address_id {
                    ops.push(UpdateOp::set("address_id", json!(v)));
                }
                if let Some(picker_id) = &req.picker_id {
                    let snapshot = self.worker_snapshot(Some(picker_id)).await;
                    ops.push(UpdateOp::set("picker_id", json!(picker_id)));
                    ops.push(UpdateOp::set("picker_obj", json!(snapshot)));
                }
                if let Some(packer_id) = &req.packer_id {
                    let snapshot = self.worker_snapshot(Some(packer_id)).await;
                    ops.push(UpdateOp::set("packer_id", json!(packer_id)));
                    ops.push(UpdateOp::set("packer_obj", json!(snapshot)));
                }
            }
            ActorRole::Picker => {
                if let Some(accepted) = req.picker_accepted {
                    ops.push(UpdateOp::set("picker_accepted", json!(accepted)));
                }
                if let Some(remark) = &req.picker_remark {
                    ops.push(UpdateOp::set("picker_remark", json!(remark)));
                }
                if let Some(packer_id) = &req.packer_id {
                    let snapshot = self.worker_snapshot(Some(packer_id)).await;
                    ops.push(UpdateOp::set("packer_id", json!(packer_id)));
                    ops.push(UpdateOp::set("packer_obj", json!(snapshot)));
                }
            }
            ActorRole::Packer => {
                if let Some(remark) = &req.packer_remark {
                    ops.push(UpdateOp::set("packer_remark", json!(remark)));
                }
            }
            ActorRole::Other => {
                tracing::debug!(id = %id, role = %actor_role, "update by unprivileged role, no effect");
            }
        }

        if !ops.is_empty() {
            ops.push(UpdateOp::set("updated_at", json!(now)));
            self.store.update_by_id("orders", id, ops).await?;
        }

        if role != ActorRole::Other {
            if let Some(raw) = req.status.as_deref() {
                self.transition_status(id, current_status, raw, role).await?;
            }
        }

        self.view.build_by_id(id).await
    }

    /// Conditional status write keyed on the previously observed status.
    /// History only grows when the stored status actually changes; losing
    /// a concurrent race re-reads and retries.
    async fn transition_status(
        &self,
        id: &str,
        observed: OrderStatus,
        raw: &str,
        role: ActorRole,
    ) -> Result<(), CoreError> {
        let target: OrderStatus = raw.parse()?;
        let mut observed = observed;

        for _ in 0..STATUS_WRITE_ATTEMPTS {
            if observed == target {
                // Re-supplying the stored status is a no-op for history.
                return Ok(());
            }

            let entry = StatusHistoryEntry {
                status: target,
                timestamp: Utc::now(),
                comment: format!("Status changed to {} by {}", target, role),
            };
            let filter = Filter::And(vec![
                Filter::Eq("_id".to_string(), json!(id)),
                Filter::Eq("status".to_string(), json!(observed.as_str())),
            ]);
            let matched = self
                .store
                .update_where(
                    "orders",
                    filter,
                    vec![
                        UpdateOp::set("status", json!(target)),
                        UpdateOp::push("status_history", json!(entry)),
                        UpdateOp::set("updated_at", json!(Utc::now())),
                    ],
                )
                .await?;

            if matched == 1 {
                self.metrics
                    .order_status_transitions
                    .with_label_values(&[target.as_str()])
                    .inc();
                tracing::info!(
                    id = %id,
                    from = %observed,
                    to = %target,
                    role = %role,
                    "order status changed"
                );
                return Ok(());
            }

            // Someone else moved the status since we read it.
            let doc = self
                .store
                .find_by_id("orders", id)
                .await?
                .ok_or_else(|| CoreError::not_found("order"))?;
            observed = doc
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("")
                .parse()
                .map_err(|_| CoreError::internal("stored order has an unknown status"))?;
        }

        Err(CoreError::internal(
            "status write kept losing to concurrent updates",
        ))
    }

    // ------------------------------------------------------------------
    // Worker queries & shifts
    // ------------------------------------------------------------------

    pub async fn my_picks(&self, picker_id: &str) -> Result<Vec<Value>, CoreError> {
        self.store
            .find(
                "orders",
                Query::with_filter(Filter::Eq("picker_id".to_string(), json!(picker_id))),
            )
            .await
    }

    pub async fn my_packs(&self, packer_id: &str) -> Result<Vec<Value>, CoreError> {
        self.store
            .find(
                "orders",
                Query::with_filter(Filter::Eq("packer_id".to_string(), json!(packer_id))),
            )
            .await
    }

    /// Upsert a worker's shift record, keyed by worker id.
    pub async fn set_shift(&self, shift: ShiftRecord) -> Result<Value, CoreError> {
        let existing = self
            .store
            .find(
                "shifts",
                Query::with_filter(Filter::Eq(
                    "worker_id".to_string(),
                    json!(shift.worker_id),
                )),
            )
            .await?;

        let id = match existing.into_iter().next() {
            Some(doc) => {
                let id = doc
                    .get("_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CoreError::internal("shift document without an id"))?
                    .to_string();
                self.store
                    .update_by_id(
                        "shifts",
                        &id,
                        vec![
                            UpdateOp::set("date", json!(shift.date)),
                            UpdateOp::set("start", json!(shift.start)),
                            UpdateOp::set("end", json!(shift.end)),
                        ],
                    )
                    .await?;
                id
            }
            None => self.store.insert("shifts", json!(shift)).await?,
        };

        self.store
            .find_by_id("shifts", &id)
            .await?
            .ok_or_else(|| CoreError::not_found("shift"))
    }

    pub async fn get_shift(&self, worker_id: &str) -> Result<Option<Value>, CoreError> {
        let mut found = self
            .store
            .find(
                "shifts",
                Query::with_filter(Filter::Eq("worker_id".to_string(), json!(worker_id))),
            )
            .await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.remove(0))
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

    struct Fixture {
        store: Arc<dyn DocumentStore>,
        svc: OrderService,
        rice: String,
        atta: String,
        picker: String,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn DocumentStore> =
            Arc::new(MemoryStore::new().unique_index("orders", "order_id"));
        let metrics = Arc::new(Metrics::new().unwrap());

        let rice = store
            .insert(
                "products",
                json!({"name": "Basmati Rice", "price": 50.0, "stock": 10,
                       "images": ["https://cdn.example/rice.jpg"]}),
            )
            .await
            .unwrap();
        let atta = store
            .insert(
                "products",
                json!({"name": "Atta", "price": 40.0, "stock": 2}),
            )
            .await
            .unwrap();
        let picker = store
            .insert(
                "users",
                json!({"name": "ravi", "phone": "8888888888", "role": ["picker"]}),
            )
            .await
            .unwrap();

        let svc = OrderService::new(store.clone(), metrics);
        Fixture {
            store,
            svc,
            rice,
            atta,
            picker,
        }
    }

    fn line(product_id: &str, quantity: i64) -> crate::domain::order::RequestedItem {
        crate::domain::order::RequestedItem {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    async fn stock_of(store: &Arc<dyn DocumentStore>, id: &str) -> i64 {
        store
            .find_by_id("products", id)
            .await
            .unwrap()
            .unwrap()
            .get("stock")
            .and_then(Value::as_i64)
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_snapshots_and_decrements() {
        let fx = fixture().await;
        let view = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 2)],
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(view["total_amount"], 100.0);
        assert_eq!(view["items"][0]["quantity"], 2);
        assert_eq!(view["items"][0]["name"], "Basmati Rice");
        assert_eq!(view["items"][0]["image"], "https://cdn.example/rice.jpg");
        assert_eq!(stock_of(&fx.store, &fx.rice).await, 8);

        // COD default: method COD, initial status confirmed
        assert_eq!(view["payment_details"]["method"], "COD");
        assert_eq!(view["status"], "confirmed");

        // Seeded history
        let history = view["status_history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["comment"], "Order placed");

        // ORD code shape
        let code = view["order_id"].as_str().unwrap();
        assert!(code.starts_with("ORD-"));
        assert_eq!(code.len(), "ORD-20260823-000001".len());
    }

    #[tokio::test]
    async fn test_create_payment_and_status_defaults() {
        let fx = fixture().await;

        // Explicit payment object wins over everything
        let view = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                payment: Some(crate::domain::order::PaymentRequest {
                    method: "UPI".to_string(),
                    ..Default::default()
                }),
                payment_method: Some("CARD".to_string()),
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(view["payment_details"]["method"], "UPI");
        assert_eq!(view["status"], "pending");

        // Legacy flat field is next in line
        let view = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                payment_method: Some("cod".to_string()),
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(view["status"], "confirmed");

        // Caller-supplied status overrides the payment default
        let view = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                status: Some("HOLD".to_string()),
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(view["status"], "hold");
    }

    #[tokio::test]
    async fn test_create_compensates_on_insufficient_stock() {
        let fx = fixture().await;
        // First line commits, second exceeds atta's stock of 2
        let err = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 3), line(&fx.atta, 5)],
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));

        // The committed decrement was rolled back
        assert_eq!(stock_of(&fx.store, &fx.rice).await, 10);
        assert_eq!(stock_of(&fx.store, &fx.atta).await, 2);
    }

    #[tokio::test]
    async fn test_create_compensates_on_missing_product() {
        let fx = fixture().await;
        let err = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 2), line("ffffffffffffffffffffffff", 1)],
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(stock_of(&fx.store, &fx.rice).await, 10);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_and_invalid_items() {
        let fx = fixture().await;
        assert!(matches!(
            fx.svc
                .create(CreateOrderRequest::default())
                .await
                .unwrap_err(),
            CoreError::Validation(_)
        ));
        assert!(matches!(
            fx.svc
                .create(CreateOrderRequest {
                    items: vec![line(&fx.rice, 0)],
                    ..CreateOrderRequest::default()
                })
                .await
                .unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_worker_snapshot_and_placeholder_fallback() {
        let fx = fixture().await;
        let view = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                picker_id: Some(fx.picker.clone()),
                packer_id: Some("ffffffffffffffffffffffff".to_string()),
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(view["picker_obj"]["name"], "ravi");
        assert_eq!(view["picker_obj"]["phone"], "8888888888");
        // Unresolvable packer falls back to the placeholder, not an error
        assert_eq!(view["packer_obj"]["id"], Value::Null);
        assert_eq!(view["packer_obj"]["name"], Value::Null);
    }

    async fn created_order(fx: &Fixture) -> String {
        let view = fx
            .svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();
        view["_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_status_change_appends_history_once() {
        let fx = fixture().await;
        let id = created_order(&fx).await;

        let view = fx
            .svc
            .update(
                &id,
                "picker",
                UpdateOrderRequest {
                    status: Some("READY".to_string()),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["status"], "ready");
        let history = view["status_history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["status"], "ready");
        assert!(history[1]["comment"]
            .as_str()
            .unwrap()
            .contains("picker"));

        // Re-supplying the same status is a history no-op
        let view = fx
            .svc
            .update(
                &id,
                "picker",
                UpdateOrderRequest {
                    status: Some("ready".to_string()),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["status_history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_locked_order_rejects_admin_content_mutation() {
        let fx = fixture().await;
        let id = created_order(&fx).await;

        fx.svc
            .update(
                &id,
                "admin",
                UpdateOrderRequest {
                    status: Some("shipped".to_string()),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();

        // Content mutation on a shipped order fails
        let err = fx
            .svc
            .update(
                &id,
                "admin",
                UpdateOrderRequest {
                    items: Some(vec![OrderItem {
                        product_id: fx.rice.clone(),
                        name: "Basmati Rice".to_string(),
                        image: None,
                        price: 50.0,
                        quantity: 5,
                    }]),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        // Status-only admin update still succeeds
        let view = fx
            .svc
            .update(
                &id,
                "admin",
                UpdateOrderRequest {
                    status: Some("delivered".to_string()),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["status"], "delivered");
    }

    #[tokio::test]
    async fn test_role_gates_field_access() {
        let fx = fixture().await;
        let id = created_order(&fx).await;

        // Picker can accept and remark
        let view = fx
            .svc
            .update(
                &id,
                "Picker",
                UpdateOrderRequest {
                    picker_accepted: Some(true),
                    picker_remark: Some("picked in aisle 4".to_string()),
                    // Content fields are silently out of a picker's reach
                    total_amount: Some(9999.0),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["picker_accepted"], true);
        assert_eq!(view["picker_remark"], "picked in aisle 4");
        assert_eq!(view["total_amount"], 50.0);

        // Packer may only remark and change status
        let view = fx
            .svc
            .update(
                &id,
                "packer",
                UpdateOrderRequest {
                    packer_remark: Some("boxed".to_string()),
                    picker_remark: Some("should not land".to_string()),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["packer_remark"], "boxed");
        assert_eq!(view["picker_remark"], "picked in aisle 4");

        // Unknown role mutates nothing, including status
        let view = fx
            .svc
            .update(
                &id,
                "customer",
                UpdateOrderRequest {
                    status: Some("cancelled".to_string()),
                    total_amount: Some(0.0),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["status"], "confirmed");
        assert_eq!(view["total_amount"], 50.0);
        assert_eq!(view["status_history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_admin_reassignment_refreshes_snapshot() {
        let fx = fixture().await;
        let id = created_order(&fx).await;

        let view = fx
            .svc
            .update(
                &id,
                "1", // legacy numeric admin code
                UpdateOrderRequest {
                    picker_id: Some(fx.picker.clone()),
                    ..UpdateOrderRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view["picker_id"], json!(fx.picker));
        assert_eq!(view["picker_obj"]["name"], "ravi");
    }

    #[tokio::test]
    async fn test_my_picks_and_my_packs() {
        let fx = fixture().await;
        fx.svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                picker_id: Some(fx.picker.clone()),
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();
        fx.svc
            .create(CreateOrderRequest {
                items: vec![line(&fx.rice, 1)],
                ..CreateOrderRequest::default()
            })
            .await
            .unwrap();

        let picks = fx.svc.my_picks(&fx.picker).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert!(fx.svc.my_packs(&fx.picker).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shift_upsert() {
        let fx = fixture().await;
        let shift = fx
            .svc
            .set_shift(ShiftRecord {
                worker_id: fx.picker.clone(),
                date: "2026-08-23".to_string(),
                start: Some("09:00".to_string()),
                end: None,
            })
            .await
            .unwrap();
        assert_eq!(shift["start"], "09:00");

        // Second write updates the same record
        fx.svc
            .set_shift(ShiftRecord {
                worker_id: fx.picker.clone(),
                date: "2026-08-23".to_string(),
                start: Some("09:00".to_string()),
                end: Some("18:00".to_string()),
            })
            .await
            .unwrap();

        let found = fx.svc.get_shift(&fx.picker).await.unwrap().unwrap();
        assert_eq!(found["end"], "18:00");
        assert!(fx.svc.get_shift("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_order_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .svc
            .update(
                "abcdefabcdefabcdefabcdef",
                "admin",
                UpdateOrderRequest::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
