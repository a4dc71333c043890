use serde::{Deserialize, Serialize};

// ============================================================================
// Product Record
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub mrp: Option<f64>,
    /// Never negative; a decrement only commits when the result stays >= 0.
    pub stock: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

fn default_available() -> bool {
    true
}

impl Product {
    /// First listed image, used for order line snapshots.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}
