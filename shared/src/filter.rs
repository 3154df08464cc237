//! Search filter vocabulary and translation
//!
//! A flat filter object of optional keys (camelCase on the wire) is
//! translated into a list of predicates, one per provided key, combined with
//! an implicit AND. Absent keys impose no constraint and unrecognized keys
//! are ignored, so a filter with an unknown key behaves exactly like the same
//! filter without it. The translator never rejects input.
//!
//! Plural array keys (`statuses`, `warehouseIds`, ...) arrive as
//! comma-separated values. Column names here are the canonical snake_case
//! database columns; this module is the only place the camelCase-to-column
//! mapping lives.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

/// Ambient request facts quick filters need (e.g. `myOrders`)
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
    pub user_id: Uuid,
}

/// One translated predicate against a named column
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match
    TextContains { column: &'static str, value: String },
    /// Inclusive lower bound on a monetary column
    MoneyMin { column: &'static str, value: Decimal },
    /// Inclusive upper bound on a monetary column
    MoneyMax { column: &'static str, value: Decimal },
    /// Inclusive lower bound on an integer column
    IntMin { column: &'static str, value: i64 },
    /// Inclusive upper bound on an integer column
    IntMax { column: &'static str, value: i64 },
    /// Inclusive lower bound on a date/timestamp column
    DateMin { column: &'static str, value: NaiveDate },
    /// Inclusive upper bound on a date/timestamp column
    DateMax { column: &'static str, value: NaiveDate },
    /// Membership in a set of string values
    OneOfStr {
        column: &'static str,
        values: Vec<String>,
    },
    /// Membership in a set of ids
    OneOfUuid {
        column: &'static str,
        values: Vec<Uuid>,
    },
    /// Exact string match (quick filters)
    EqualsStr { column: &'static str, value: String },
    /// Exact id match (quick filters)
    EqualsUuid { column: &'static str, value: Uuid },
    /// Exact boolean match (quick filters)
    EqualsBool { column: &'static str, value: bool },
}

/// Split a comma-separated plural key into its values
fn parse_list(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a comma-separated list of ids, skipping unparseable entries
fn parse_uuid_list(raw: &Option<String>) -> Vec<Uuid> {
    parse_list(raw)
        .iter()
        .filter_map(|v| Uuid::parse_str(v).ok())
        .collect()
}

fn push_list(out: &mut Vec<Predicate>, column: &'static str, raw: &Option<String>) {
    let values = parse_list(raw);
    if !values.is_empty() {
        out.push(Predicate::OneOfStr { column, values });
    }
}

fn push_uuid_list(out: &mut Vec<Predicate>, column: &'static str, raw: &Option<String>) {
    let values = parse_uuid_list(raw);
    if !values.is_empty() {
        out.push(Predicate::OneOfUuid { column, values });
    }
}

fn push_text(out: &mut Vec<Predicate>, column: &'static str, raw: &Option<String>) {
    if let Some(value) = raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        out.push(Predicate::TextContains {
            column,
            value: value.to_string(),
        });
    }
}

/// Filters accepted by the purchase order list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseOrderFilter {
    pub reference: Option<String>,
    pub supplier: Option<String>,
    pub statuses: Option<String>,
    pub priorities: Option<String>,
    pub warehouse_ids: Option<String>,
    pub total_min: Option<Decimal>,
    pub total_max: Option<Decimal>,
    pub created_min: Option<NaiveDate>,
    pub created_max: Option<NaiveDate>,
    pub is_urgent: Option<bool>,
    pub my_orders: Option<bool>,
}

impl PurchaseOrderFilter {
    pub fn predicates(&self, ctx: &FilterContext) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_text(&mut out, "reference", &self.reference);
        push_text(&mut out, "supplier_name", &self.supplier);
        push_list(&mut out, "status", &self.statuses);
        push_list(&mut out, "priority", &self.priorities);
        push_uuid_list(&mut out, "warehouse_id", &self.warehouse_ids);
        if let Some(value) = self.total_min {
            out.push(Predicate::MoneyMin {
                column: "total_amount",
                value,
            });
        }
        if let Some(value) = self.total_max {
            out.push(Predicate::MoneyMax {
                column: "total_amount",
                value,
            });
        }
        if let Some(value) = self.created_min {
            out.push(Predicate::DateMin {
                column: "created_at",
                value,
            });
        }
        if let Some(value) = self.created_max {
            out.push(Predicate::DateMax {
                column: "created_at",
                value,
            });
        }
        if self.is_urgent == Some(true) {
            out.push(Predicate::EqualsStr {
                column: "priority",
                value: "urgent".to_string(),
            });
        }
        if self.my_orders == Some(true) {
            out.push(Predicate::EqualsUuid {
                column: "created_by",
                value: ctx.user_id,
            });
        }
        out
    }
}

/// Filters accepted by the sales order list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesOrderFilter {
    pub reference: Option<String>,
    pub customer: Option<String>,
    pub statuses: Option<String>,
    pub priorities: Option<String>,
    pub warehouse_ids: Option<String>,
    pub total_min: Option<Decimal>,
    pub total_max: Option<Decimal>,
    pub created_min: Option<NaiveDate>,
    pub created_max: Option<NaiveDate>,
    pub is_urgent: Option<bool>,
    pub my_orders: Option<bool>,
}

impl SalesOrderFilter {
    pub fn predicates(&self, ctx: &FilterContext) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_text(&mut out, "reference", &self.reference);
        push_text(&mut out, "customer_name", &self.customer);
        push_list(&mut out, "status", &self.statuses);
        push_list(&mut out, "priority", &self.priorities);
        push_uuid_list(&mut out, "warehouse_id", &self.warehouse_ids);
        if let Some(value) = self.total_min {
            out.push(Predicate::MoneyMin {
                column: "total_amount",
                value,
            });
        }
        if let Some(value) = self.total_max {
            out.push(Predicate::MoneyMax {
                column: "total_amount",
                value,
            });
        }
        if let Some(value) = self.created_min {
            out.push(Predicate::DateMin {
                column: "created_at",
                value,
            });
        }
        if let Some(value) = self.created_max {
            out.push(Predicate::DateMax {
                column: "created_at",
                value,
            });
        }
        if self.is_urgent == Some(true) {
            out.push(Predicate::EqualsStr {
                column: "priority",
                value: "urgent".to_string(),
            });
        }
        if self.my_orders == Some(true) {
            out.push(Predicate::EqualsUuid {
                column: "created_by",
                value: ctx.user_id,
            });
        }
        out
    }
}

/// Filters accepted by the product list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub sku: Option<String>,
    pub categories: Option<String>,
    pub cost_min: Option<Decimal>,
    pub cost_max: Option<Decimal>,
    pub active_only: Option<bool>,
}

impl ProductFilter {
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_text(&mut out, "name", &self.search);
        push_text(&mut out, "sku", &self.sku);
        push_list(&mut out, "category", &self.categories);
        if let Some(value) = self.cost_min {
            out.push(Predicate::MoneyMin {
                column: "unit_cost",
                value,
            });
        }
        if let Some(value) = self.cost_max {
            out.push(Predicate::MoneyMax {
                column: "unit_cost",
                value,
            });
        }
        if self.active_only == Some(true) {
            out.push(Predicate::EqualsBool {
                column: "active",
                value: true,
            });
        }
        out
    }
}

/// Filters accepted by the stock movement list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovementFilter {
    pub warehouse_ids: Option<String>,
    pub product_ids: Option<String>,
    pub movement_types: Option<String>,
    pub order_reference: Option<String>,
    pub quantity_min: Option<i64>,
    pub quantity_max: Option<i64>,
    pub date_min: Option<NaiveDate>,
    pub date_max: Option<NaiveDate>,
}

impl MovementFilter {
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut out = Vec::new();
        push_uuid_list(&mut out, "warehouse_id", &self.warehouse_ids);
        push_uuid_list(&mut out, "product_id", &self.product_ids);
        push_list(&mut out, "movement_type", &self.movement_types);
        push_text(&mut out, "order_reference", &self.order_reference);
        if let Some(value) = self.quantity_min {
            out.push(Predicate::IntMin {
                column: "quantity",
                value,
            });
        }
        if let Some(value) = self.quantity_max {
            out.push(Predicate::IntMax {
                column: "quantity",
                value,
            });
        }
        if let Some(value) = self.date_min {
            out.push(Predicate::DateMin {
                column: "created_at",
                value,
            });
        }
        if let Some(value) = self.date_max {
            out.push(Predicate::DateMax {
                column: "created_at",
                value,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ctx() -> FilterContext {
        FilterContext {
            user_id: Uuid::nil(),
        }
    }

    #[test]
    fn test_empty_filter_produces_no_predicates() {
        assert!(PurchaseOrderFilter::default().predicates(&ctx()).is_empty());
        assert!(SalesOrderFilter::default().predicates(&ctx()).is_empty());
        assert!(ProductFilter::default().predicates().is_empty());
        assert!(MovementFilter::default().predicates().is_empty());
    }

    #[test]
    fn test_unknown_key_behaves_like_omitted() {
        let with_unknown: MovementFilter = serde_json::from_value(serde_json::json!({
            "quantityMin": 5,
            "someFutureKey": "whatever"
        }))
        .unwrap();
        let without: MovementFilter = serde_json::from_value(serde_json::json!({
            "quantityMin": 5
        }))
        .unwrap();
        assert_eq!(with_unknown.predicates(), without.predicates());
    }

    #[test]
    fn test_quantity_range_pair() {
        let filter = MovementFilter {
            quantity_min: Some(5),
            quantity_max: Some(20),
            ..Default::default()
        };
        assert_eq!(
            filter.predicates(),
            vec![
                Predicate::IntMin {
                    column: "quantity",
                    value: 5
                },
                Predicate::IntMax {
                    column: "quantity",
                    value: 20
                },
            ]
        );
    }

    #[test]
    fn test_plural_key_is_comma_separated() {
        let filter = PurchaseOrderFilter {
            statuses: Some("draft, approved".to_string()),
            ..Default::default()
        };
        assert_eq!(
            filter.predicates(&ctx()),
            vec![Predicate::OneOfStr {
                column: "status",
                values: vec!["draft".to_string(), "approved".to_string()],
            }]
        );
    }

    #[test]
    fn test_blank_text_imposes_no_constraint() {
        let filter = SalesOrderFilter {
            customer: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(filter.predicates(&ctx()).is_empty());
    }

    #[test]
    fn test_my_orders_quick_filter() {
        let user = Uuid::new_v4();
        let filter = SalesOrderFilter {
            my_orders: Some(true),
            ..Default::default()
        };
        let preds = filter.predicates(&FilterContext { user_id: user });
        assert_eq!(
            preds,
            vec![Predicate::EqualsUuid {
                column: "created_by",
                value: user
            }]
        );

        // An explicit false is the same as absent
        let filter = SalesOrderFilter {
            my_orders: Some(false),
            ..Default::default()
        };
        assert!(filter
            .predicates(&FilterContext { user_id: user })
            .is_empty());
    }

    #[test]
    fn test_is_urgent_maps_to_fixed_predicate() {
        let filter = PurchaseOrderFilter {
            is_urgent: Some(true),
            ..Default::default()
        };
        assert_eq!(
            filter.predicates(&ctx()),
            vec![Predicate::EqualsStr {
                column: "priority",
                value: "urgent".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_ids_are_skipped_not_rejected() {
        let filter = MovementFilter {
            warehouse_ids: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        assert!(filter.predicates().is_empty());
    }

    #[test]
    fn test_money_range_uses_decimal() {
        let filter = ProductFilter {
            cost_min: Some(Decimal::from_str("1.50").unwrap()),
            ..Default::default()
        };
        assert_eq!(
            filter.predicates(),
            vec![Predicate::MoneyMin {
                column: "unit_cost",
                value: Decimal::from_str("1.50").unwrap()
            }]
        );
    }
}
