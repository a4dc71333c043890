// ============================================================================
// Domain Modules
// ============================================================================
//
// One module per aggregate:
// - role:    canonical Role records + heterogeneous-token resolver
// - user:    user documents carrying raw role tokens
// - product: product records + the atomic inventory guard
// - order:   order lifecycle, role-gated state machine, view builder
//
// ============================================================================

pub mod order;
pub mod product;
pub mod role;
pub mod user;
