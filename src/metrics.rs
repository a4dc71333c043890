use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics - Prometheus counters for the order-processing core
// ============================================================================
//
// The registry is exposed for the boundary to scrape; no HTTP server lives
// in the core.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order lifecycle
    pub orders_created: IntCounter,
    pub order_status_transitions: IntCounterVec,

    // Inventory guard
    pub stock_decrements: IntCounter,
    pub stock_conflicts: IntCounter,

    // Role resolver
    pub role_lookups: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_status_transitions = IntCounterVec::new(
            Opts::new(
                "order_status_transitions_total",
                "Order status transitions by target status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(order_status_transitions.clone()))?;

        let stock_decrements = IntCounter::new(
            "stock_decrements_total",
            "Stock decrements committed by the inventory guard",
        )?;
        registry.register(Box::new(stock_decrements.clone()))?;

        let stock_conflicts = IntCounter::new(
            "stock_conflicts_total",
            "Decrements refused because stock was insufficient",
        )?;
        registry.register(Box::new(stock_conflicts.clone()))?;

        let role_lookups = IntCounterVec::new(
            Opts::new(
                "role_lookups_total",
                "Batched role-resolver lookups by token bucket",
            ),
            &["bucket"],
        )?;
        registry.register(Box::new(role_lookups.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_status_transitions,
            stock_decrements,
            stock_conflicts,
            role_lookups,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
