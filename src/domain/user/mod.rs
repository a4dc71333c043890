use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// User Record
// ============================================================================
//
// `role` stays exactly as written: a scalar or array of heterogeneous
// tokens. Normalization happens only at read time through the role
// resolver, never on the write path.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Raw role tokens (or resolved role objects after a resolver pass).
    #[serde(default)]
    pub role: Value,
    /// Bearer token issued at the boundary; looked up by check_token.
    #[serde(default)]
    pub token: Option<String>,
}
