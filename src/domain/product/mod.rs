// ============================================================================
// Product Domain
// ============================================================================
//
// Stock is mutated only through the inventory guard, never by generic
// entity updates. The guard's conditional decrement is what keeps stock
// non-negative under concurrent order creation.
//
// ============================================================================

pub mod inventory;
pub mod model;

pub use inventory::InventoryGuard;
pub use model::Product;
