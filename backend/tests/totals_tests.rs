//! Order financial calculation tests
//!
//! Covers line totals, order totals aggregation, currency rounding and the
//! derived item statuses that depend on receiving/fulfillment progress.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use shared::{
    line_totals, order_totals, round_money, LineFinancials, PurchaseItemStatus, SalesItemStatus,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Minimal line for exercising the calculator without a database row
struct TestLine {
    quantity: i32,
    unit: Decimal,
    discount: Decimal,
}

impl LineFinancials for TestLine {
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

fn line(quantity: i32, unit: &str, discount: &str) -> TestLine {
    TestLine {
        quantity,
        unit: dec(unit),
        discount: dec(discount),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_line_total_is_quantity_times_unit() {
        let totals = line_totals(&line(10, "100.00", "0"));
        assert_eq!(totals.line_total, dec("1000.00"));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.final_line_total, dec("1000.00"));
    }

    #[test]
    fn test_line_discount_applied_before_aggregation() {
        // 4 x 25.50 = 102.00, 10% off = 10.20
        let totals = line_totals(&line(4, "25.50", "10"));
        assert_eq!(totals.line_total, dec("102.00"));
        assert_eq!(totals.discount_amount, dec("10.20"));
        assert_eq!(totals.final_line_total, dec("91.80"));
    }

    #[test]
    fn test_unit_cost_four_decimals_rounds_at_line_level() {
        // 7 x 3.3333 = 23.3331 -> 23.33
        let totals = line_totals(&line(7, "3.3333", "0"));
        assert_eq!(totals.line_total, dec("23.33"));
    }

    #[test]
    fn test_hundred_percent_discount_zeroes_line() {
        let totals = line_totals(&line(3, "19.99", "100"));
        assert_eq!(totals.discount_amount, totals.line_total);
        assert_eq!(totals.final_line_total, Decimal::ZERO);
    }

    #[test]
    fn test_fractional_discount_rounds_half_away_from_zero() {
        // 1 x 10.01, 2.5% = 0.250250 -> 0.25
        let totals = line_totals(&line(1, "10.01", "2.5"));
        assert_eq!(totals.discount_amount, dec("0.25"));

        // 1 x 10.20, 2.5% = 0.2550 -> 0.26 (midpoint goes up)
        let totals = line_totals(&line(1, "10.20", "2.5"));
        assert_eq!(totals.discount_amount, dec("0.26"));
    }

    #[test]
    fn test_order_totals_full_worked_example() {
        // Two lines: 10 x 100.00 and 4 x 25.50 at 10% off.
        // Subtotal 1091.80, 22% tax 240.20 (240.196 rounded), shipping 50,
        // order discount 30.
        let lines = [
            line_totals(&line(10, "100.00", "0")).final_line_total,
            line_totals(&line(4, "25.50", "10")).final_line_total,
        ];
        let totals = order_totals(&lines, dec("0.22"), dec("50.00"), dec("30.00"));
        assert_eq!(totals.subtotal, dec("1091.80"));
        assert_eq!(totals.tax_amount, dec("240.20"));
        assert_eq!(totals.total_amount, dec("1352.00"));
    }

    #[test]
    fn test_tax_applied_to_subtotal_not_shipping() {
        // Shipping is added after tax, so tax on 100.00 at 10% is 10.00
        // regardless of shipping.
        let with_shipping = order_totals(&[dec("100.00")], dec("0.10"), dec("99.00"), Decimal::ZERO);
        let without = order_totals(&[dec("100.00")], dec("0.10"), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(with_shipping.tax_amount, without.tax_amount);
        assert_eq!(with_shipping.tax_amount, dec("10.00"));
    }

    #[test]
    fn test_order_discount_subtracted_after_tax() {
        let totals = order_totals(&[dec("200.00")], dec("0.20"), Decimal::ZERO, dec("40.00"));
        // 200 + 40 tax - 40 discount
        assert_eq!(totals.total_amount, dec("200.00"));
    }

    #[test]
    fn test_empty_order_totals_only_shipping_remains() {
        let totals = order_totals(&[], dec("0.22"), dec("15.00"), Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec("15.00"));
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(dec("2.675")), dec("2.68"));
        assert_eq!(round_money(dec("2.674")), dec("2.67"));
        assert_eq!(round_money(dec("-2.675")), dec("-2.68"));
    }

    #[test]
    fn test_purchase_item_status_progress() {
        assert_eq!(
            PurchaseItemStatus::from_progress(10, 0),
            PurchaseItemStatus::Pending
        );
        assert_eq!(
            PurchaseItemStatus::from_progress(10, 4),
            PurchaseItemStatus::PartiallyReceived
        );
        assert_eq!(
            PurchaseItemStatus::from_progress(10, 10),
            PurchaseItemStatus::FullyReceived
        );
    }

    #[test]
    fn test_sales_item_status_progress() {
        assert_eq!(
            SalesItemStatus::from_progress(10, 0, 0),
            SalesItemStatus::Pending
        );
        assert_eq!(
            SalesItemStatus::from_progress(10, 0, 10),
            SalesItemStatus::Backordered
        );
        assert_eq!(
            SalesItemStatus::from_progress(10, 4, 6),
            SalesItemStatus::PartiallyFulfilled
        );
        assert_eq!(
            SalesItemStatus::from_progress(10, 10, 0),
            SalesItemStatus::FullyFulfilled
        );
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn money_strategy() -> impl Strategy<Value = Decimal> {
        // Up to 4 decimal places, as stored for unit amounts
        (0i64..=10_000_000).prop_map(|n| Decimal::new(n, 4))
    }

    fn discount_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=10_000).prop_map(|n| Decimal::new(n, 2))
    }

    fn tax_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=1_000_000).prop_map(|n| Decimal::new(n, 6))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A line's discount never exceeds its gross total, and the final
        /// total is never negative.
        #[test]
        fn prop_line_discount_bounded(
            quantity in 0i32..=100_000,
            unit in money_strategy(),
            discount in discount_strategy()
        ) {
            let totals = line_totals(&TestLine { quantity, unit, discount });
            prop_assert!(totals.discount_amount >= Decimal::ZERO);
            prop_assert!(totals.discount_amount <= totals.line_total);
            prop_assert!(totals.final_line_total >= Decimal::ZERO);
            prop_assert_eq!(
                totals.final_line_total,
                totals.line_total - totals.discount_amount
            );
        }

        /// Monetary outputs always sit at currency precision: re-rounding
        /// changes nothing.
        #[test]
        fn prop_line_totals_at_currency_precision(
            quantity in 0i32..=100_000,
            unit in money_strategy(),
            discount in discount_strategy()
        ) {
            let totals = line_totals(&TestLine { quantity, unit, discount });
            prop_assert_eq!(round_money(totals.line_total), totals.line_total);
            prop_assert_eq!(round_money(totals.discount_amount), totals.discount_amount);
            prop_assert_eq!(round_money(totals.final_line_total), totals.final_line_total);
        }

        /// total = subtotal + tax + shipping - discount, exactly, for any
        /// input set.
        #[test]
        fn prop_order_total_identity(
            lines in prop::collection::vec(money_strategy(), 0..20),
            tax_rate in tax_strategy(),
            shipping in money_strategy(),
            discount in money_strategy()
        ) {
            let shipping = round_money(shipping);
            let discount = round_money(discount);
            let totals = order_totals(&lines, tax_rate, shipping, discount);
            prop_assert_eq!(
                totals.total_amount,
                totals.subtotal + totals.tax_amount + totals.shipping_cost
                    - totals.discount_amount
            );
        }

        /// Tax amount is derived from the current rate alone: recomputing
        /// with a new rate gives the same subtotal and a tax consistent with
        /// the new rate.
        #[test]
        fn prop_tax_recomputed_from_current_rate(
            lines in prop::collection::vec(money_strategy(), 1..10),
            rate_a in tax_strategy(),
            rate_b in tax_strategy()
        ) {
            let a = order_totals(&lines, rate_a, Decimal::ZERO, Decimal::ZERO);
            let b = order_totals(&lines, rate_b, Decimal::ZERO, Decimal::ZERO);
            prop_assert_eq!(a.subtotal, b.subtotal);
            prop_assert_eq!(a.tax_amount, round_money(a.subtotal * rate_a));
            prop_assert_eq!(b.tax_amount, round_money(b.subtotal * rate_b));
        }

        /// Item status derivation is total: every progress combination maps
        /// to exactly one status, and full progress is always terminal.
        #[test]
        fn prop_purchase_item_status_total(
            ordered in 1i32..=10_000,
            received in 0i32..=10_000
        ) {
            let status = PurchaseItemStatus::from_progress(ordered, received);
            if received >= ordered {
                prop_assert_eq!(status, PurchaseItemStatus::FullyReceived);
            } else if received > 0 {
                prop_assert_eq!(status, PurchaseItemStatus::PartiallyReceived);
            } else {
                prop_assert_eq!(status, PurchaseItemStatus::Pending);
            }
        }
    }
}
