// ============================================================================
// Order Domain
// ============================================================================
//
// This module contains all order-specific code:
// - Model (Order, OrderItem, OrderStatus, payment and worker sub-records)
// - Service (creation with the stock compensation log, role-gated updates,
//   worker queries, shifts)
// - View builder (projection into the external response shape)
//
// ============================================================================

pub mod model;
pub mod service;
pub mod view;

pub use model::{
    ActorRole, CreateOrderRequest, Order, OrderItem, OrderStatus, PaymentDetails, PaymentRequest,
    RequestedItem, ShiftRecord, StatusHistoryEntry, UpdateOrderRequest, WorkerAssignment,
};
pub use service::OrderService;
pub use view::OrderViewBuilder;
