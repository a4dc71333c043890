use chrono::Utc;
use rand::Rng;

// ============================================================================
// Identifier & Slug Utilities
// ============================================================================

/// Generate a 24-hex-character document id (12 random bytes, hex-encoded).
/// Same shape as the legacy reference ids found in user role arrays.
pub fn new_document_id() -> String {
    let bytes: [u8; 12] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// True when `s` looks like a document reference: exactly 24 hex chars.
pub fn is_reference_id(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Generate a human-readable order code: `ORD-YYYYMMDD-NNNNNN`.
/// Not globally unique on its own; the caller retries on duplicate-key
/// conflict against the order_id unique index.
pub fn new_order_code() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD-{}-{:06}", date, suffix)
}

/// Derive a role key from its display name: lowercase, runs of
/// non-alphanumeric characters collapsed to a single underscore.
/// Deterministic, so case/spacing variants of a name collide on purpose.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

// ============================================================================
// Unit Tests
// ============================================================================
