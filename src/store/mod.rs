use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CoreError;

// ============================================================================
// Document Store Capability
// ============================================================================
//
// Every entity service composes this trait instead of inheriting a CRUD
// base. The single primitive the domain's concurrency story rests on is
// `update_where`: predicate match and mutation happen atomically, so the
// Inventory Guard and status-field writes stay correct under concurrent
// writers without any domain-level locking.
//
// `MemoryStore` is the in-process engine; a driver-backed store plugs in
// behind the same trait at the boundary.
//
// ============================================================================

mod memory;
pub mod query;

pub use memory::MemoryStore;
pub use query::{parse_projection, parse_sort, path_value, Filter, Query, SortDir, UpdateOp};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one document. Assigns a 24-hex `_id` when absent and enforces
    /// the collection's unique indexes. Returns the document id.
    async fn insert(&self, collection: &str, doc: Value) -> Result<String, CoreError>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>, CoreError>;

    /// Filter, sort, paginate, and project in one call.
    async fn find(&self, collection: &str, query: Query) -> Result<Vec<Value>, CoreError>;

    /// Apply mutations to one document by id. Returns the matched count
    /// (0 when the id is unknown).
    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        ops: Vec<UpdateOp>,
    ) -> Result<u64, CoreError>;

    /// Atomic conditional update: mutate every document matching `filter`,
    /// with match and mutation under one store-side critical section.
    /// Returns the matched count.
    async fn update_where(
        &self,
        collection: &str,
        filter: Filter,
        ops: Vec<UpdateOp>,
    ) -> Result<u64, CoreError>;

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, CoreError>;

    /// Monotonic named counter (role_id allocation).
    async fn next_sequence(&self, name: &str) -> Result<i64, CoreError>;
}
