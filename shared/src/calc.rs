//! Financial calculations for order lines and order totals
//!
//! All arithmetic uses `rust_decimal::Decimal`. Monetary results are rounded
//! to 2 decimal places (midpoint away from zero); unit costs may carry up to
//! 4 decimal places. Derived order fields are always produced together so a
//! caller can never persist a subtotal computed against one tax rate and a
//! total computed against another.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places for monetary totals
pub const MONEY_DP: u32 = 2;

/// Decimal places for per-unit costs and prices
pub const UNIT_DP: u32 = 4;

/// Round a monetary amount to currency precision
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Base financial fields of an order line, with variant-specific accessors
///
/// Purchase items price in unit cost, sales items in unit price; everything
/// downstream of those accessors is identical.
pub trait LineFinancials {
    fn quantity_ordered(&self) -> i32;
    fn unit_amount(&self) -> Decimal;
    fn discount_percentage(&self) -> Decimal;
}

/// Derived monetary fields of one order line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    pub line_total: Decimal,
    pub discount_amount: Decimal,
    pub final_line_total: Decimal,
}

/// Compute a line's derived totals from its base fields
///
/// A zero or absent discount yields an exact `Decimal::ZERO` discount amount,
/// not a rounding artifact.
pub fn line_totals(item: &impl LineFinancials) -> LineTotals {
    let line_total = round_money(Decimal::from(item.quantity_ordered()) * item.unit_amount());

    let discount_amount = if item.discount_percentage() > Decimal::ZERO {
        round_money(line_total * item.discount_percentage() / Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    };

    LineTotals {
        line_total,
        discount_amount,
        final_line_total: line_total - discount_amount,
    }
}

/// Derived order-level monetary fields, always produced as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

/// Aggregate line totals into order totals
///
/// `tax_rate` is the stored fraction (0.22 for 22%). Must be called whenever
/// a line is added, updated or removed, or any of the order-level financial
/// fields change.
pub fn order_totals(
    final_line_totals: &[Decimal],
    tax_rate: Decimal,
    shipping_cost: Decimal,
    discount_amount: Decimal,
) -> OrderTotals {
    let subtotal = round_money(final_line_totals.iter().copied().sum());
    let tax_amount = round_money(subtotal * tax_rate);
    let total_amount = round_money(subtotal + tax_amount + shipping_cost - discount_amount);

    OrderTotals {
        subtotal,
        tax_amount,
        shipping_cost,
        discount_amount,
        total_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct Line {
        quantity: i32,
        unit: Decimal,
        discount: Decimal,
    }

    impl LineFinancials for Line {
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

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_line_totals_no_discount() {
        let line = Line {
            quantity: 10,
            unit: dec("100.00"),
            discount: Decimal::ZERO,
        };
        let totals = line_totals(&line);
        assert_eq!(totals.line_total, dec("1000.00"));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.final_line_total, dec("1000.00"));
    }

    #[test]
    fn test_line_totals_with_discount() {
        let line = Line {
            quantity: 4,
            unit: dec("25.50"),
            discount: dec("10"),
        };
        let totals = line_totals(&line);
        assert_eq!(totals.line_total, dec("102.00"));
        assert_eq!(totals.discount_amount, dec("10.20"));
        assert_eq!(totals.final_line_total, dec("91.80"));
    }

    #[test]
    fn test_line_totals_four_decimal_unit_cost() {
        let line = Line {
            quantity: 3,
            unit: dec("19.9999"),
            discount: Decimal::ZERO,
        };
        let totals = line_totals(&line);
        // 59.9997 rounds to currency precision
        assert_eq!(totals.line_total, dec("60.00"));
    }

    #[test]
    fn test_line_totals_zero_quantity() {
        let line = Line {
            quantity: 0,
            unit: dec("50.00"),
            discount: dec("25"),
        };
        let totals = line_totals(&line);
        assert_eq!(totals.line_total, Decimal::ZERO);
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.final_line_total, Decimal::ZERO);
    }

    #[test]
    fn test_line_totals_full_discount() {
        let line = Line {
            quantity: 2,
            unit: dec("10.00"),
            discount: dec("100"),
        };
        let totals = line_totals(&line);
        assert_eq!(totals.final_line_total, Decimal::ZERO);
    }

    #[test]
    fn test_order_totals_with_tax_shipping_discount() {
        // 10 × 100.00, no discount, tax 22%, shipping 50, order discount 30
        let totals = order_totals(&[dec("1000.00")], dec("0.22"), dec("50.00"), dec("30.00"));
        assert_eq!(totals.subtotal, dec("1000.00"));
        assert_eq!(totals.tax_amount, dec("220.00"));
        assert_eq!(totals.total_amount, dec("1240.00"));
    }

    #[test]
    fn test_order_totals_tax_rate_change() {
        let totals = order_totals(&[dec("1000.00")], dec("0.25"), dec("50.00"), dec("30.00"));
        assert_eq!(totals.tax_amount, dec("250.00"));
        assert_eq!(totals.total_amount, dec("1270.00"));
    }

    #[test]
    fn test_order_totals_empty_items() {
        let totals = order_totals(&[], dec("0.22"), dec("10.00"), Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec("10.00"));
    }

    #[test]
    fn test_order_totals_identity() {
        let totals = order_totals(
            &[dec("91.80"), dec("250.00"), dec("13.37")],
            dec("0.07"),
            dec("12.50"),
            dec("5.00"),
        );
        assert_eq!(
            totals.total_amount,
            totals.subtotal + totals.tax_amount + totals.shipping_cost - totals.discount_amount
        );
    }

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(dec("1.005")), dec("1.01"));
        assert_eq!(round_money(dec("1.004")), dec("1.00"));
    }
}
