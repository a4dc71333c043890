use futures_util::future::try_join_all;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::errors::CoreError;
use crate::metrics::Metrics;
use crate::store::{DocumentStore, Filter, Query};
use crate::utils::is_reference_id;

// ============================================================================
// Role Resolver
// ============================================================================
//
// User documents carry `role` as a scalar or list mixing numeric codes,
// numeric-looking strings, 24-hex document references, slug keys, and
// (after a previous resolution pass) full role objects. Tokens are
// classified into a tagged variant, looked up with at most one batched
// query per bucket, and replaced in place. Unmatched tokens stay exactly
// where they were; array length and order are preserved.
//
// A store error fails the whole batch; there is no partial-success path.
//
// ============================================================================

/// Tagged raw role identifier. Classification precedence: number first,
/// then 24-hex reference, then plain key. Non-scalar entries (already
/// resolved role objects) classify as nothing and are left untouched,
/// which is what makes resolution idempotent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleToken {
    Numeric(i64),
    Key(String),
    Ref(String),
}

impl RoleToken {
    pub fn classify(value: &Value) -> Option<RoleToken> {
        if let Some(n) = value.as_i64() {
            return Some(RoleToken::Numeric(n));
        }
        if let Some(f) = value.as_f64() {
            return Some(RoleToken::Numeric(f as i64));
        }
        let s = value.as_str()?;
        if let Ok(n) = s.parse::<i64>() {
            return Some(RoleToken::Numeric(n));
        }
        if is_reference_id(s) {
            return Some(RoleToken::Ref(s.to_string()));
        }
        Some(RoleToken::Key(s.to_string()))
    }

    /// The string this token resolves under in the combined lookup map.
    fn map_key(&self) -> String {
        match self {
            RoleToken::Numeric(n) => n.to_string(),
            RoleToken::Key(k) => k.clone(),
            RoleToken::Ref(r) => r.clone(),
        }
    }
}

pub struct RoleResolver {
    store: Arc<dyn DocumentStore>,
    metrics: Arc<Metrics>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn DocumentStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Resolve the `role` field of every user document in the batch,
    /// replacing matched tokens with canonical role records in place.
    pub async fn resolve_users(&self, users: &mut [Value]) -> Result<(), CoreError> {
        let mut numeric: BTreeSet<i64> = BTreeSet::new();
        let mut keys: BTreeSet<String> = BTreeSet::new();
        let mut refs: BTreeSet<String> = BTreeSet::new();

        for user in users.iter() {
            for token in collect_tokens(user) {
                match token {
                    RoleToken::Numeric(n) => {
                        numeric.insert(n);
                    }
                    RoleToken::Key(k) => {
                        keys.insert(k);
                    }
                    RoleToken::Ref(r) => {
                        refs.insert(r);
                    }
                }
            }
        }

        // At most one batched lookup per non-empty bucket, issued
        // concurrently.
        let mut lookups = Vec::new();
        if !numeric.is_empty() {
            self.metrics.role_lookups.with_label_values(&["numeric"]).inc();
            let arms = numeric
                .iter()
                .map(|n| Filter::Eq("role_type".to_string(), json!(n)))
                .collect();
            lookups.push(self.store.find("roles", Query::with_filter(Filter::Or(arms))));
        }
        if !keys.is_empty() {
            self.metrics.role_lookups.with_label_values(&["key"]).inc();
            let arms = keys
                .iter()
                .map(|k| Filter::Eq("key".to_string(), json!(k)))
                .collect();
            lookups.push(self.store.find("roles", Query::with_filter(Filter::Or(arms))));
        }
        if !refs.is_empty() {
            self.metrics.role_lookups.with_label_values(&["reference"]).inc();
            let arms = refs
                .iter()
                .map(|r| Filter::Eq("_id".to_string(), json!(r)))
                .collect();
            lookups.push(self.store.find("roles", Query::with_filter(Filter::Or(arms))));
        }

        if lookups.is_empty() {
            return Ok(());
        }

        let results = try_join_all(lookups).await?;

        // One map, each role reachable through up to three keys:
        // stringified role_type, slug key, and stringified id.
        let mut by_token: HashMap<String, Value> = HashMap::new();
        for role in results.into_iter().flatten() {
            if let Some(role_type) = role.get("role_type").and_then(Value::as_i64) {
                by_token.insert(role_type.to_string(), role.clone());
            }
            if let Some(key) = role.get("key").and_then(Value::as_str) {
                by_token.insert(key.to_string(), role.clone());
            }
            if let Some(id) = role.get("_id").and_then(Value::as_str) {
                by_token.insert(id.to_string(), role.clone());
            }
        }

        for user in users.iter_mut() {
            swap_matched_tokens(user, &by_token);
        }

        Ok(())
    }

    pub async fn resolve_user(&self, user: &mut Value) -> Result<(), CoreError> {
        self.resolve_users(std::slice::from_mut(user)).await
    }
}

fn collect_tokens(user: &Value) -> Vec<RoleToken> {
    match user.get("role") {
        Some(Value::Array(entries)) => entries.iter().filter_map(RoleToken::classify).collect(),
        Some(scalar) => RoleToken::classify(scalar).into_iter().collect(),
        None => Vec::new(),
    }
}

fn swap_matched_tokens(user: &mut Value, by_token: &HashMap<String, Value>) {
    let Some(role_field) = user.get_mut("role") else {
        return;
    };
    match role_field {
        Value::Array(entries) => {
            for entry in entries.iter_mut() {
                swap_one(entry, by_token);
            }
        }
        scalar => swap_one(scalar, by_token),
    }
}

fn swap_one(slot: &mut Value, by_token: &HashMap<String, Value>) {
    if let Some(token) = RoleToken::classify(slot) {
        if let Some(role) = by_token.get(&token.map_key()) {
            *slot = role.clone();
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_token_classification_precedence() {
        assert_eq!(RoleToken::classify(&json!(2)), Some(RoleToken::Numeric(2)));
        // Numeric-looking string parses as a number first
        assert_eq!(
            RoleToken::classify(&json!("3")),
            Some(RoleToken::Numeric(3))
        );
        assert_eq!(
            RoleToken::classify(&json!("64a1b2c3d4e5f6a7b8c9d0e1")),
            Some(RoleToken::Ref("64a1b2c3d4e5f6a7b8c9d0e1".to_string()))
        );
        assert_eq!(
            RoleToken::classify(&json!("picker")),
            Some(RoleToken::Key("picker".to_string()))
        );
        // Already-resolved role objects classify as nothing
        assert_eq!(RoleToken::classify(&json!({"key": "picker"})), None);
        assert_eq!(RoleToken::classify(&Value::Null), None);
    }

    async fn seeded_resolver() -> (RoleResolver, String) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let picker_id = store
            .insert(
                "roles",
                json!({"name": "Picker", "key": "picker", "role_id": 2, "role_type": 2}),
            )
            .await
            .unwrap();
        store
            .insert(
                "roles",
                json!({"name": "Admin", "key": "admin", "role_id": 1, "role_type": 1}),
            )
            .await
            .unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());
        (RoleResolver::new(store, metrics), picker_id)
    }

    #[tokio::test]
    async fn test_resolves_mixed_token_kinds_in_one_batch() {
        let (resolver, picker_id) = seeded_resolver().await;

        let mut users = vec![
            json!({"name": "a", "role": [1, "picker"]}),
            json!({"name": "b", "role": ["2", picker_id]}),
        ];
        resolver.resolve_users(&mut users).await.unwrap();

        assert_eq!(users[0]["role"][0]["key"], "admin");
        assert_eq!(users[0]["role"][1]["key"], "picker");
        // Numeric-looking string and reference both land on the same record
        assert_eq!(users[1]["role"][0]["key"], "picker");
        assert_eq!(users[1]["role"][1]["key"], "picker");
    }

    #[tokio::test]
    async fn test_unmatched_tokens_are_preserved_in_place() {
        let (resolver, _) = seeded_resolver().await;

        let mut users = vec![json!({"role": ["ghost_role", 1, 99]})];
        resolver.resolve_users(&mut users).await.unwrap();

        let roles = users[0]["role"].as_array().unwrap();
        assert_eq!(roles.len(), 3);
        assert_eq!(roles[0], json!("ghost_role"));
        assert_eq!(roles[1]["key"], "admin");
        assert_eq!(roles[2], json!(99));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let (resolver, _) = seeded_resolver().await;

        let mut user = json!({"role": [1, "picker"]});
        resolver.resolve_user(&mut user).await.unwrap();
        let first_pass = user.clone();

        resolver.resolve_user(&mut user).await.unwrap();
        assert_eq!(user, first_pass);
    }

    #[tokio::test]
    async fn test_scalar_role_field() {
        let (resolver, _) = seeded_resolver().await;

        let mut user = json!({"role": "admin"});
        resolver.resolve_user(&mut user).await.unwrap();
        assert_eq!(user["role"]["role_id"], 1);

        // Users without a role field pass through untouched
        let mut bare = json!({"name": "c"});
        resolver.resolve_user(&mut bare).await.unwrap();
        assert_eq!(bare, json!({"name": "c"}));
    }
}
