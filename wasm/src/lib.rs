//! WebAssembly module for the Stockroom browser client
//!
//! Provides client-side computation for:
//! - Saved filter storage (local-storage payloads, versioned schema)
//! - Line total previews while editing order lines
//! - Offline input validation
//!
//! Saved filters are a browser-side convenience only; they never gain
//! server-side identity and are replayed as plain query parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wasm_bindgen::prelude::*;

use shared::calc::{line_totals, LineFinancials};
use shared::validation::{parse_tax_rate, validate_discount_percentage};

/// Current saved-filter payload schema version
///
/// Version 0 payloads (a bare JSON array, before versioning existed) are
/// migrated on load so a filter-key rename never silently produces a no-op
/// filter from an old entry.
pub const SAVED_FILTER_SCHEMA_VERSION: u32 = 1;

/// One saved filter entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: String,
    pub name: String,
    /// Arbitrary key -> value filter payload, replayed as query parameters
    pub filters: serde_json::Value,
    /// Milliseconds since the Unix epoch, as reported by `Date.now()`
    pub created_at: f64,
    pub usage_count: u32,
}

/// Versioned local-storage payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedFilterStore {
    pub version: u32,
    pub filters: Vec<SavedFilter>,
}

impl Default for SavedFilterStore {
    fn default() -> Self {
        Self {
            version: SAVED_FILTER_SCHEMA_VERSION,
            filters: Vec::new(),
        }
    }
}

impl SavedFilterStore {
    /// Parse a local-storage payload, migrating legacy shapes
    pub fn load(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }

        if let Ok(store) = serde_json::from_str::<SavedFilterStore>(raw) {
            return store;
        }

        // v0 payloads were a bare array of entries
        if let Ok(filters) = serde_json::from_str::<Vec<SavedFilter>>(raw) {
            return Self {
                version: SAVED_FILTER_SCHEMA_VERSION,
                filters,
            };
        }

        web_sys::console::warn_1(&"stockroom: discarding unreadable saved-filter payload".into());
        Self::default()
    }

    pub fn add(&mut self, name: &str, filters: serde_json::Value) -> &SavedFilter {
        let entry = SavedFilter {
            id: next_id(),
            name: name.to_string(),
            filters,
            created_at: js_sys::Date::now(),
            usage_count: 0,
        };
        self.filters.push(entry);
        // Just pushed, last element exists
        self.filters.last().unwrap()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.id != id);
        self.filters.len() != before
    }

    /// Bump the usage counter and return the filter payload for replay
    pub fn record_usage(&mut self, id: &str) -> Option<&serde_json::Value> {
        let entry = self.filters.iter_mut().find(|f| f.id == id)?;
        entry.usage_count += 1;
        Some(&entry.filters)
    }
}

fn next_id() -> String {
    format!("sf-{}", js_sys::Date::now() as u64)
}

/// Parse a saved-filter local-storage payload, migrating old schemas.
/// Returns the canonical JSON to write back.
#[wasm_bindgen]
pub fn load_saved_filters(raw: &str) -> Result<String, JsValue> {
    let store = SavedFilterStore::load(raw);
    serde_json::to_string(&store).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Add a saved filter to a payload; returns the updated payload JSON
#[wasm_bindgen]
pub fn add_saved_filter(raw: &str, name: &str, filters_json: &str) -> Result<String, JsValue> {
    let filters: serde_json::Value = serde_json::from_str(filters_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid filter JSON: {}", e)))?;

    let mut store = SavedFilterStore::load(raw);
    store.add(name, filters);
    serde_json::to_string(&store).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Remove a saved filter by id; returns the updated payload JSON
#[wasm_bindgen]
pub fn remove_saved_filter(raw: &str, id: &str) -> Result<String, JsValue> {
    let mut store = SavedFilterStore::load(raw);
    store.remove(id);
    serde_json::to_string(&store).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Record a saved filter being applied; returns the updated payload JSON
#[wasm_bindgen]
pub fn record_saved_filter_usage(raw: &str, id: &str) -> Result<String, JsValue> {
    let mut store = SavedFilterStore::load(raw);
    store.record_usage(id);
    serde_json::to_string(&store).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Preview a line's final total while the user edits an order line
///
/// Mirrors the server-side calculation so the edit dialog can show live
/// totals; the server remains authoritative on save.
#[wasm_bindgen]
pub fn preview_line_total(
    quantity: i32,
    unit_amount: &str,
    discount_percentage: &str,
) -> Result<String, JsValue> {
    if quantity < 0 {
        return Err(JsValue::from_str("Quantity cannot be negative"));
    }

    let unit = Decimal::from_str(unit_amount)
        .map_err(|_| JsValue::from_str("Invalid unit amount"))?;
    let discount = if discount_percentage.trim().is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from_str(discount_percentage)
            .map_err(|_| JsValue::from_str("Invalid discount percentage"))?
    };
    validate_discount_percentage(discount).map_err(JsValue::from_str)?;

    struct PreviewLine {
        quantity: i32,
        unit: Decimal,
        discount: Decimal,
    }

    impl LineFinancials for PreviewLine {
        fn quantity_ordered(&self) -> i32 {
            self.quantity
        }

        fn unit_amount(&self) -> Decimal {
            self.unit
        }

        fn discount_percentage(&self) -> Decimal {
            self.discount
        }
    }

    let totals = line_totals(&PreviewLine {
        quantity,
        unit,
        discount,
    });
    Ok(totals.final_line_total.to_string())
}

/// Validate a tax rate percentage string and return the stored fraction
#[wasm_bindgen]
pub fn normalize_tax_rate(input: &str) -> Result<String, JsValue> {
    parse_tax_rate(input)
        .map(|f| f.to_string())
        .map_err(JsValue::from_str)
}
