use serde::{Deserialize, Serialize};

// ============================================================================
// Role Record
// ============================================================================

/// Canonical role. `key` is the slug derived from `name`; `role_id` comes
/// from the monotonic sequence and `role_type` mirrors it. Identity fields
/// are stable after creation except through an explicit rename, which
/// regenerates `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub key: String,
    pub role_id: i64,
    pub role_type: i64,
}
