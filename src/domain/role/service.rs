use serde_json::json;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::store::{DocumentStore, UpdateOp};
use crate::utils::slugify;

use super::model::Role;

// ============================================================================
// Role Service
// ============================================================================

pub struct RoleService {
    store: Arc<dyn DocumentStore>,
}

impl RoleService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a role. The key is derived deterministically from the name,
    /// so case/spacing variants of an existing name collide with Conflict.
    /// role_id comes from the monotonic sequence; role_type mirrors it.
    pub async fn create(&self, name: &str) -> Result<Role, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("role name must not be empty"));
        }
        let key = slugify(name);
        if key.is_empty() {
            return Err(CoreError::validation(
                "role name must contain at least one alphanumeric character",
            ));
        }

        let role_id = self.store.next_sequence("role_id").await?;
        let id = self
            .store
            .insert(
                "roles",
                json!({
                    "name": name,
                    "key": key,
                    "role_id": role_id,
                    "role_type": role_id,
                }),
            )
            .await?;

        tracing::info!(role = name, key = %key, role_id = role_id, "role created");

        Ok(Role {
            id,
            name: name.to_string(),
            key,
            role_id,
            role_type: role_id,
        })
    }

    /// Rename a role. Regenerates the key from the new name (Conflict when
    /// the derived key is taken); role_id and role_type stay put.
    pub async fn rename(&self, id: &str, new_name: &str) -> Result<Role, CoreError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CoreError::validation("role name must not be empty"));
        }
        let key = slugify(new_name);

        let matched = self
            .store
            .update_by_id(
                "roles",
                id,
                vec![
                    UpdateOp::set("name", json!(new_name)),
                    UpdateOp::set("key", json!(key)),
                ],
            )
            .await?;
        if matched == 0 {
            return Err(CoreError::not_found("role"));
        }

        tracing::info!(role = new_name, key = %key, "role renamed");
        self.find(id).await
    }

    pub async fn find(&self, id: &str) -> Result<Role, CoreError> {
        let doc = self
            .store
            .find_by_id("roles", id)
            .await?
            .ok_or_else(|| CoreError::not_found("role"))?;
        serde_json::from_value(doc)
            .map_err(|e| CoreError::internal(format!("malformed role document: {}", e)))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
