//! Sales order models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calc::LineFinancials;

use super::OrderPriority;

/// Sales order lifecycle statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Confirmed,
    PartiallyFulfilled,
    FullyFulfilled,
    Shipped,
    Delivered,
    Cancelled,
    Closed,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Draft => "draft",
            SalesOrderStatus::PendingApproval => "pending_approval",
            SalesOrderStatus::Approved => "approved",
            SalesOrderStatus::Confirmed => "confirmed",
            SalesOrderStatus::PartiallyFulfilled => "partially_fulfilled",
            SalesOrderStatus::FullyFulfilled => "fully_fulfilled",
            SalesOrderStatus::Shipped => "shipped",
            SalesOrderStatus::Delivered => "delivered",
            SalesOrderStatus::Cancelled => "cancelled",
            SalesOrderStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(SalesOrderStatus::Draft),
            "pending_approval" => Some(SalesOrderStatus::PendingApproval),
            "approved" => Some(SalesOrderStatus::Approved),
            "confirmed" => Some(SalesOrderStatus::Confirmed),
            "partially_fulfilled" => Some(SalesOrderStatus::PartiallyFulfilled),
            "fully_fulfilled" => Some(SalesOrderStatus::FullyFulfilled),
            "shipped" => Some(SalesOrderStatus::Shipped),
            "delivered" => Some(SalesOrderStatus::Delivered),
            "cancelled" => Some(SalesOrderStatus::Cancelled),
            "closed" => Some(SalesOrderStatus::Closed),
            _ => None,
        }
    }
}

/// Sales order line item statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesItemStatus {
    Pending,
    Backordered,
    PartiallyFulfilled,
    FullyFulfilled,
}

impl SalesItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesItemStatus::Pending => "pending",
            SalesItemStatus::Backordered => "backordered",
            SalesItemStatus::PartiallyFulfilled => "partially_fulfilled",
            SalesItemStatus::FullyFulfilled => "fully_fulfilled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SalesItemStatus::Pending),
            "backordered" => Some(SalesItemStatus::Backordered),
            "partially_fulfilled" => Some(SalesItemStatus::PartiallyFulfilled),
            "fully_fulfilled" => Some(SalesItemStatus::FullyFulfilled),
            _ => None,
        }
    }

    /// Derive the item status from fulfillment progress
    pub fn from_progress(
        quantity_ordered: i32,
        quantity_fulfilled: i32,
        quantity_backordered: i32,
    ) -> Self {
        if quantity_fulfilled >= quantity_ordered && quantity_ordered > 0 {
            SalesItemStatus::FullyFulfilled
        } else if quantity_fulfilled > 0 {
            SalesItemStatus::PartiallyFulfilled
        } else if quantity_backordered > 0 {
            SalesItemStatus::Backordered
        } else {
            SalesItemStatus::Pending
        }
    }
}

/// A sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    /// Human-readable reference code, e.g. `SO-202501-001`
    pub reference: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub warehouse_id: Uuid,
    pub status: SalesOrderStatus,
    pub priority: OrderPriority,
    pub subtotal: Decimal,
    /// Stored as a fraction in [0, 1]
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub confirmed_by: Option<Uuid>,
    pub fulfilled_by: Option<Uuid>,
    pub shipped_by: Option<Uuid>,
    pub delivered_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A line on a sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderItem {
    pub id: Uuid,
    pub sales_order_id: Uuid,
    pub product_id: Uuid,
    pub quantity_ordered: i32,
    pub allocated_quantity: i32,
    pub quantity_fulfilled: i32,
    pub quantity_shipped: i32,
    pub quantity_backordered: i32,
    /// Price per unit, up to 4 decimal places
    pub unit_price: Decimal,
    /// Percentage in [0, 100]
    pub discount_percentage: Decimal,
    pub line_total: Decimal,
    pub discount_amount: Decimal,
    pub final_line_total: Decimal,
    pub item_status: SalesItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LineFinancials for SalesOrderItem {
    fn quantity_ordered(&self) -> i32 {
        self.quantity_ordered
    }

    fn unit_amount(&self) -> Decimal {
        self.unit_price
    }

    fn discount_percentage(&self) -> Decimal {
        self.discount_percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            SalesOrderStatus::Draft,
            SalesOrderStatus::PendingApproval,
            SalesOrderStatus::Approved,
            SalesOrderStatus::Confirmed,
            SalesOrderStatus::PartiallyFulfilled,
            SalesOrderStatus::FullyFulfilled,
            SalesOrderStatus::Shipped,
            SalesOrderStatus::Delivered,
            SalesOrderStatus::Cancelled,
            SalesOrderStatus::Closed,
        ] {
            assert_eq!(SalesOrderStatus::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_item_status_from_progress() {
        assert_eq!(
            SalesItemStatus::from_progress(10, 0, 0),
            SalesItemStatus::Pending
        );
        assert_eq!(
            SalesItemStatus::from_progress(10, 0, 4),
            SalesItemStatus::Backordered
        );
        assert_eq!(
            SalesItemStatus::from_progress(10, 4, 0),
            SalesItemStatus::PartiallyFulfilled
        );
        assert_eq!(
            SalesItemStatus::from_progress(10, 10, 0),
            SalesItemStatus::FullyFulfilled
        );
    }
}
