//! Search filter translation tests
//!
//! List endpoints accept a flat object of optional camelCase keys; each
//! provided key becomes one predicate and the predicates combine with AND.
//! These tests exercise the translation layer the way the endpoints consume
//! it: deserialize a query payload, translate, inspect the predicates.

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use shared::{
    FilterContext, MovementFilter, Predicate, ProductFilter, PurchaseOrderFilter, SalesOrderFilter,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn ctx() -> FilterContext {
    FilterContext {
        user_id: Uuid::nil(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter: PurchaseOrderFilter = serde_json::from_value(json!({})).unwrap();
        assert!(filter.predicates(&ctx()).is_empty());
    }

    #[test]
    fn test_each_key_contributes_one_predicate() {
        let filter: PurchaseOrderFilter = serde_json::from_value(json!({
            "supplier": "Acme",
            "statuses": "draft,approved",
            "totalMin": "100.00",
        }))
        .unwrap();
        assert_eq!(filter.predicates(&ctx()).len(), 3);
    }

    #[test]
    fn test_text_search_is_substring_predicate() {
        let filter: SalesOrderFilter = serde_json::from_value(json!({
            "customer": "Northwind"
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(&ctx()),
            vec![Predicate::TextContains {
                column: "customer_name",
                value: "Northwind".to_string()
            }]
        );
    }

    #[test]
    fn test_status_list_is_membership_predicate() {
        let filter: SalesOrderFilter = serde_json::from_value(json!({
            "statuses": "confirmed, partially_fulfilled"
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(&ctx()),
            vec![Predicate::OneOfStr {
                column: "status",
                values: vec![
                    "confirmed".to_string(),
                    "partially_fulfilled".to_string()
                ],
            }]
        );
    }

    #[test]
    fn test_amount_range_is_inclusive_pair() {
        let filter: PurchaseOrderFilter = serde_json::from_value(json!({
            "totalMin": "100.00",
            "totalMax": "500.00"
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(&ctx()),
            vec![
                Predicate::MoneyMin {
                    column: "total_amount",
                    value: dec("100.00")
                },
                Predicate::MoneyMax {
                    column: "total_amount",
                    value: dec("500.00")
                },
            ]
        );
    }

    #[test]
    fn test_date_range_on_created_at() {
        let filter: SalesOrderFilter = serde_json::from_value(json!({
            "createdMin": "2025-01-01",
            "createdMax": "2025-01-31"
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(&ctx()),
            vec![
                Predicate::DateMin {
                    column: "created_at",
                    value: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
                },
                Predicate::DateMax {
                    column: "created_at",
                    value: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
                },
            ]
        );
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let with_unknown: ProductFilter = serde_json::from_value(json!({
            "search": "widget",
            "color": "red"
        }))
        .unwrap();
        let without: ProductFilter = serde_json::from_value(json!({
            "search": "widget"
        }))
        .unwrap();
        assert_eq!(with_unknown.predicates(), without.predicates());
    }

    #[test]
    fn test_urgent_quick_filter_expands_to_priority_equality() {
        let filter: PurchaseOrderFilter =
            serde_json::from_value(json!({ "isUrgent": true })).unwrap();
        assert_eq!(
            filter.predicates(&ctx()),
            vec![Predicate::EqualsStr {
                column: "priority",
                value: "urgent".to_string()
            }]
        );
    }

    #[test]
    fn test_my_orders_quick_filter_uses_requesting_user() {
        let user = Uuid::new_v4();
        let filter: SalesOrderFilter =
            serde_json::from_value(json!({ "myOrders": true })).unwrap();
        assert_eq!(
            filter.predicates(&FilterContext { user_id: user }),
            vec![Predicate::EqualsUuid {
                column: "created_by",
                value: user
            }]
        );
    }

    #[test]
    fn test_quick_filter_false_is_no_constraint() {
        let filter: PurchaseOrderFilter = serde_json::from_value(json!({
            "isUrgent": false,
            "myOrders": false
        }))
        .unwrap();
        assert!(filter.predicates(&ctx()).is_empty());
    }

    #[test]
    fn test_warehouse_id_list() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let filter: MovementFilter = serde_json::from_value(json!({
            "warehouseIds": format!("{},{}", a, b)
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(),
            vec![Predicate::OneOfUuid {
                column: "warehouse_id",
                values: vec![a, b]
            }]
        );
    }

    #[test]
    fn test_malformed_ids_skipped_not_rejected() {
        let good = Uuid::new_v4();
        let filter: MovementFilter = serde_json::from_value(json!({
            "warehouseIds": format!("{},definitely-not-a-uuid", good)
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(),
            vec![Predicate::OneOfUuid {
                column: "warehouse_id",
                values: vec![good]
            }]
        );
    }

    #[test]
    fn test_movement_quantity_range() {
        let filter: MovementFilter = serde_json::from_value(json!({
            "quantityMin": 10,
            "quantityMax": 100
        }))
        .unwrap();
        assert_eq!(
            filter.predicates(),
            vec![
                Predicate::IntMin {
                    column: "quantity",
                    value: 10
                },
                Predicate::IntMax {
                    column: "quantity",
                    value: 100
                },
            ]
        );
    }

    #[test]
    fn test_product_active_only_quick_filter() {
        let filter: ProductFilter =
            serde_json::from_value(json!({ "activeOnly": true })).unwrap();
        assert_eq!(
            filter.predicates(),
            vec![Predicate::EqualsBool {
                column: "active",
                value: true
            }]
        );
    }

    #[test]
    fn test_combined_filter_is_conjunction_of_all_keys() {
        let filter: PurchaseOrderFilter = serde_json::from_value(json!({
            "supplier": "Acme",
            "statuses": "sent_to_supplier",
            "prioritys_typo_ignored": "x",
            "totalMin": "50.00",
            "createdMin": "2025-02-01",
            "isUrgent": true
        }))
        .unwrap();
        let preds = filter.predicates(&ctx());
        // One predicate per recognized key; the typo key contributes nothing
        assert_eq!(preds.len(), 5);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn word_strategy() -> impl Strategy<Value = String> {
        "[a-z]{1,12}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The number of predicates never exceeds the number of provided
        /// keys, and translation never fails.
        #[test]
        fn prop_predicate_count_bounded_by_keys(
            supplier in prop::option::of(word_strategy()),
            statuses in prop::option::of(word_strategy()),
            urgent in prop::option::of(any::<bool>()),
            mine in prop::option::of(any::<bool>())
        ) {
            let provided = [
                supplier.is_some(),
                statuses.is_some(),
                urgent.is_some(),
                mine.is_some(),
            ]
            .iter()
            .filter(|p| **p)
            .count();

            let filter = PurchaseOrderFilter {
                supplier,
                statuses,
                is_urgent: urgent,
                my_orders: mine,
                ..Default::default()
            };
            prop_assert!(filter.predicates(&ctx()).len() <= provided);
        }

        /// Comma-separated lists keep every non-blank entry in order.
        #[test]
        fn prop_list_values_preserved(
            values in prop::collection::vec(word_strategy(), 1..6)
        ) {
            let filter = SalesOrderFilter {
                statuses: Some(values.join(",")),
                ..Default::default()
            };
            let preds = filter.predicates(&ctx());
            prop_assert_eq!(preds.len(), 1);
            match &preds[0] {
                Predicate::OneOfStr { column, values: got } => {
                    prop_assert_eq!(*column, "status");
                    prop_assert_eq!(got, &values);
                }
                other => prop_assert!(false, "unexpected predicate {:?}", other),
            }
        }

        /// Whitespace-only text keys impose no constraint.
        #[test]
        fn prop_blank_text_is_noop(padding in " {0,8}") {
            let filter = ProductFilter {
                search: Some(padding),
                ..Default::default()
            };
            prop_assert!(filter.predicates().is_empty());
        }
    }
}
