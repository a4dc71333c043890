// ============================================================================
// Role Domain
// ============================================================================
//
// Legacy data references roles three different ways: numeric codes,
// 24-hex document references, and slug keys. The resolver is the
// compatibility layer that turns any of them into the canonical Role
// record so the rest of the system never dispatches on raw tokens.
//
// ============================================================================

pub mod model;
pub mod resolver;
pub mod service;

pub use model::Role;
pub use resolver::{RoleResolver, RoleToken};
pub use service::RoleService;
