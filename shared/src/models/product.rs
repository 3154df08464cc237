//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    /// Unique stock keeping unit, uppercase alphanumeric
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Default purchasing cost per unit, up to 4 decimal places
    pub unit_cost: Decimal,
    /// Default selling price per unit, up to 4 decimal places
    pub unit_price: Decimal,
    /// Stock level at which the product appears in low-stock listings
    pub reorder_level: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
