use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ============================================================================
// Order Model
// ============================================================================

/// The fixed order state set. Serialized lowercase; incoming values are
/// lower-cased before comparison, so `"SHIPPED"` parses fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Ready,
    Hold,
    Ship,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Ready => "ready",
            OrderStatus::Hold => "hold",
            OrderStatus::Ship => "ship",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Content mutation (items, totals, shipping, address) is frozen once
    /// an order reaches one of these states.
    pub fn is_locked(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped
                | OrderStatus::Delivered
                | OrderStatus::Returned
                | OrderStatus::Cancelled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "ready" => Ok(OrderStatus::Ready),
            "hold" => Ok(OrderStatus::Hold),
            "ship" => Ok(OrderStatus::Ship),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            other => Err(CoreError::validation(format!(
                "unknown order status '{}'",
                other
            ))),
        }
    }
}

/// One order line, frozen at creation time. Later product edits never
/// alter historical orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: f64,
    pub quantity: i64,
}

/// Payment snapshot. This is not a ledger; fields record what the gateway
/// reported at the time, nothing more.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payable_amount: Option<f64>,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Embedded picker/packer snapshot, denormalized at assignment time. The
/// all-null shape is the placeholder used whenever resolution fails or no
/// worker is assigned, so responses always carry a complete object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub accepted: Option<bool>,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub history: Vec<Value>,
}

impl WorkerAssignment {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Append-only status log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-readable unique code `ORD-YYYYMMDD-NNNNNN`, immutable once set.
    pub order_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub address_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_details: PaymentDetails,
    #[serde(default)]
    pub picker_id: Option<String>,
    #[serde(default)]
    pub packer_id: Option<String>,
    #[serde(default)]
    pub picker_obj: WorkerAssignment,
    #[serde(default)]
    pub packer_obj: WorkerAssignment,
    #[serde(default)]
    pub picker_accepted: Option<bool>,
    #[serde(default)]
    pub picker_remark: Option<String>,
    #[serde(default)]
    pub packer_remark: Option<String>,
    /// Never rewritten, only appended to.
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub shipping_city: Option<String>,
    #[serde(default)]
    pub shipping_pincode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedItem {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub method: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payable_amount: Option<f64>,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub address_id: Option<String>,
    pub items: Vec<RequestedItem>,
    #[serde(default)]
    pub picker_id: Option<String>,
    #[serde(default)]
    pub packer_id: Option<String>,
    #[serde(default)]
    pub payment: Option<PaymentRequest>,
    /// Legacy flat field, consulted when no payment object is present.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Explicit initial status; overrides the payment-method default.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub shipping_city: Option<String>,
    #[serde(default)]
    pub shipping_pincode: Option<String>,
}

impl Default for PaymentRequest {
    fn default() -> Self {
        Self {
            method: "COD".to_string(),
            gateway: None,
            currency: None,
            payable_amount: None,
            paid_amount: None,
            transaction_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub shipping_city: Option<String>,
    #[serde(default)]
    pub shipping_pincode: Option<String>,
    #[serde(default)]
    pub address_id: Option<String>,
    #[serde(default)]
    pub picker_id: Option<String>,
    #[serde(default)]
    pub packer_id: Option<String>,
    #[serde(default)]
    pub picker_accepted: Option<bool>,
    #[serde(default)]
    pub picker_remark: Option<String>,
    #[serde(default)]
    pub packer_remark: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl UpdateOrderRequest {
    /// Content fields frozen on locked orders. Worker reassignment and
    /// status are deliberately not content.
    pub fn has_content_mutation(&self) -> bool {
        self.items.is_some()
            || self.total_amount.is_some()
            || self.shipping_address.is_some()
            || self.shipping_city.is_some()
            || self.shipping_pincode.is_some()
            || self.address_id.is_some()
    }
}

// ============================================================================
// Actor Roles
// ============================================================================

/// Mutation gate for order updates. `1` is the legacy numeric admin code.
/// Anything unrecognized falls into `Other`, which mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Admin,
    Picker,
    Packer,
    Other,
}

impl ActorRole {
    pub fn parse(raw: &str) -> ActorRole {
        match raw.trim().to_lowercase().as_str() {
            "admin" | "1" => ActorRole::Admin,
            "picker" => ActorRole::Picker,
            "packer" => ActorRole::Packer,
            _ => ActorRole::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Admin => "admin",
            ActorRole::Picker => "picker",
            ActorRole::Packer => "packer",
            ActorRole::Other => "other",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Shift Records
// ============================================================================

/// Per-worker shift record, upserted by worker id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub worker_id: String,
    pub date: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

// ============================================================================
// Unit Tests
// ============================================================================
