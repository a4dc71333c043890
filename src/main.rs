use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod domain;
mod entity;
mod errors;
mod metrics;
mod store;
mod utils;

use domain::order::{CreateOrderRequest, OrderService, RequestedItem, UpdateOrderRequest};
use domain::role::{RoleResolver, RoleService};
use entity::{EntityService, ListParams, ADDRESSES, ORDERS, PRODUCTS, ROLES, USERS};
use store::{DocumentStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fulfillment_core=debug")),
        )
        .init();

    tracing::info!("🚀 Starting Fulfillment Core Demo");

    // === 1. Document store with unique indexes ===
    let store: Arc<dyn DocumentStore> = Arc::new(
        MemoryStore::new()
            .unique_index("orders", "order_id")
            .unique_index("roles", "key")
            .unique_index("roles", "role_id")
            .unique_index("users", "token"),
    );

    // === 2. Initialize Prometheus metrics ===
    tracing::info!("Initializing metrics");
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 3. Seed roles, workers, and catalog ===
    let roles = RoleService::new(store.clone());
    let picker_role = roles.create("Picker").await?;
    let packer_role = roles.create("Packer").await?;
    tracing::info!(
        "✅ Roles seeded: {} (#{}), {} (#{})",
        picker_role.key,
        picker_role.role_id,
        packer_role.key,
        packer_role.role_id
    );

    let picker_id = store
        .insert(
            "users",
            json!({
                "name": "ravi",
                "phone": "8888888888",
                "email": "ravi@example.com",
                "role": [picker_role.role_id],
                "token": "picker-token",
            }),
        )
        .await?;
    let customer_id = store
        .insert(
            "users",
            json!({
                "name": "asha",
                "phone": "9999999999",
                "email": "asha@example.com",
                "role": ["customer"],
                "token": "customer-token",
            }),
        )
        .await?;

    let rice_id = store
        .insert(
            "products",
            json!({
                "name": "Basmati Rice 5kg",
                "price": 550.0,
                "mrp": 620.0,
                "stock": 40,
                "available": true,
                "images": ["https://cdn.example/rice.jpg"],
            }),
        )
        .await?;
    let atta_id = store
        .insert(
            "products",
            json!({
                "name": "Whole Wheat Atta 10kg",
                "price": 420.0,
                "stock": 25,
                "available": true,
            }),
        )
        .await?;
    let addresses = EntityService::new(store.clone(), ADDRESSES);
    let address = addresses
        .create(json!({
            "user_id": &customer_id,
            "address": "Sector 18",
            "city": "Noida",
            "pincode": "201301",
        }))
        .await?;
    let address_id = address["_id"].as_str().unwrap_or_default().to_string();
    tracing::info!("✅ Catalog seeded: 2 products, 2 users, 1 address");

    // === 4. Demonstrate the order lifecycle ===
    tracing::info!("📝 Demonstrating order lifecycle");
    let orders = OrderService::new(store.clone(), metrics.clone());

    let order = orders
        .create(CreateOrderRequest {
            user_id: Some(customer_id.clone()),
            address_id: Some(address_id),
            items: vec![
                RequestedItem {
                    product_id: rice_id.clone(),
                    quantity: 2,
                },
                RequestedItem {
                    product_id: atta_id.clone(),
                    quantity: 1,
                },
            ],
            picker_id: Some(picker_id.clone()),
            shipping_city: Some("Noida".to_string()),
            ..CreateOrderRequest::default()
        })
        .await?;
    let order_doc_id = order["_id"].as_str().unwrap_or_default().to_string();
    tracing::info!(
        "✅ Order created: {} (total {})",
        order["order_id"],
        order["total_amount"]
    );

    // Picker accepts and moves the order along
    let order = orders
        .update(
            &order_doc_id,
            "picker",
            UpdateOrderRequest {
                picker_accepted: Some(true),
                picker_remark: Some("picking from aisle 4".to_string()),
                status: Some("ready".to_string()),
                ..UpdateOrderRequest::default()
            },
        )
        .await?;
    tracing::info!("✅ Picker accepted, order is now {}", order["status"]);

    // Admin ships it
    let order = orders
        .update(
            &order_doc_id,
            "admin",
            UpdateOrderRequest {
                status: Some("shipped".to_string()),
                ..UpdateOrderRequest::default()
            },
        )
        .await?;
    tracing::info!(
        "✅ Order shipped, history has {} entries",
        order["status_history"].as_array().map(Vec::len).unwrap_or(0)
    );

    // === 5. Generic entity access with search ===
    let order_entities = EntityService::new(store.clone(), ORDERS);
    let found = order_entities
        .find_all(ListParams {
            search: Some("noida".to_string()),
            ..ListParams::default()
        })
        .await?;
    tracing::info!("🔎 Search 'noida' matched {} order(s)", found.len());

    let product_entities = EntityService::new(store.clone(), PRODUCTS);
    let catalog = product_entities
        .select("name,price", Some(json!({"price": {"$gte": 400}})))
        .await?;
    tracing::info!("🔎 Catalog projection returned {} product(s)", catalog.len());

    let role_entities = EntityService::new(store.clone(), ROLES);
    let all_roles = role_entities.find_all(ListParams::default()).await?;
    tracing::info!("🔎 {} role(s) on record", all_roles.len());

    let user_entities = EntityService::new(store.clone(), USERS);
    let bearer = user_entities.check_token(Some("Bearer picker-token")).await?;
    tracing::info!("🔐 Bearer token resolved to {}", bearer["name"]);

    // === 6. The inventory guard refuses an oversell atomically ===
    match orders
        .create(CreateOrderRequest {
            items: vec![RequestedItem {
                product_id: atta_id.clone(),
                quantity: 999,
            }],
            ..CreateOrderRequest::default()
        })
        .await
    {
        Err(e) => tracing::warn!(kind = ?e.kind(), "🛑 Oversell refused: {}", e),
        Ok(_) => tracing::error!("oversell unexpectedly succeeded"),
    }

    // === 7. Role resolution over raw user documents ===
    let resolver = RoleResolver::new(store.clone(), metrics.clone());
    let mut users = store.find("users", store::Query::default()).await?;
    resolver.resolve_users(&mut users).await?;
    tracing::info!("✅ Resolved role objects for {} user(s)", users.len());

    // Final projection: populated address, expanded items, resolved roles
    let final_view = orders.view().build_by_id(&order_doc_id).await?;
    tracing::info!(
        "📦 Final order view: {} for {} at {}, {}",
        final_view["order_id"],
        final_view["user"]["name"],
        final_view["address"]["address"],
        final_view["address"]["city"]
    );

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
