use serde::Serialize;

// ============================================================================
// Core Error Taxonomy
// ============================================================================
//
// Every failure that affects correctness aborts its operation with one of
// these typed errors. Mapping to a transport envelope (HTTP status, JSON
// body) is the boundary layer's job; the core only guarantees a stable
// `ErrorKind` plus a human-readable message.
//
// ============================================================================

/// Stable error classification exposed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("duplicate value for unique field '{field}' in {collection}")]
    Conflict { collection: String, field: String },

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Classification used by the boundary to pick a transport envelope.
    /// Insufficient stock is a bad request, not an internal fault.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::InsufficientStock { .. } => ErrorKind::Validation,
            CoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CoreError::Internal(msg.into())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
