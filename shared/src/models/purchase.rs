//! Purchase order models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calc::LineFinancials;

use super::OrderPriority;

/// Purchase order lifecycle statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    SentToSupplier,
    PartiallyReceived,
    FullyReceived,
    Cancelled,
    Closed,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::PendingApproval => "pending_approval",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::SentToSupplier => "sent_to_supplier",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::FullyReceived => "fully_received",
            PurchaseOrderStatus::Cancelled => "cancelled",
            PurchaseOrderStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PurchaseOrderStatus::Draft),
            "pending_approval" => Some(PurchaseOrderStatus::PendingApproval),
            "approved" => Some(PurchaseOrderStatus::Approved),
            "sent_to_supplier" => Some(PurchaseOrderStatus::SentToSupplier),
            "partially_received" => Some(PurchaseOrderStatus::PartiallyReceived),
            "fully_received" => Some(PurchaseOrderStatus::FullyReceived),
            "cancelled" => Some(PurchaseOrderStatus::Cancelled),
            "closed" => Some(PurchaseOrderStatus::Closed),
            _ => None,
        }
    }
}

/// Purchase order line item statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseItemStatus {
    Pending,
    PartiallyReceived,
    FullyReceived,
}

impl PurchaseItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseItemStatus::Pending => "pending",
            PurchaseItemStatus::PartiallyReceived => "partially_received",
            PurchaseItemStatus::FullyReceived => "fully_received",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PurchaseItemStatus::Pending),
            "partially_received" => Some(PurchaseItemStatus::PartiallyReceived),
            "fully_received" => Some(PurchaseItemStatus::FullyReceived),
            _ => None,
        }
    }

    /// Derive the item status from receiving progress
    pub fn from_progress(quantity_ordered: i32, quantity_received: i32) -> Self {
        if quantity_received <= 0 {
            PurchaseItemStatus::Pending
        } else if quantity_received < quantity_ordered {
            PurchaseItemStatus::PartiallyReceived
        } else {
            PurchaseItemStatus::FullyReceived
        }
    }
}

/// A purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Uuid,
    /// Human-readable reference code, e.g. `PO-202501-001`
    pub reference: String,
    pub supplier_name: String,
    pub warehouse_id: Uuid,
    pub status: PurchaseOrderStatus,
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
    pub sent_by: Option<Uuid>,
    pub received_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A line on a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub product_id: Uuid,
    pub quantity_ordered: i32,
    pub quantity_received: i32,
    pub quantity_rejected: i32,
    /// Cost per unit, up to 4 decimal places
    pub unit_cost: Decimal,
    /// Percentage in [0, 100]
    pub discount_percentage: Decimal,
    pub line_total: Decimal,
    pub discount_amount: Decimal,
    pub final_line_total: Decimal,
    pub item_status: PurchaseItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrderItem {
    /// Units still outstanding against the ordered quantity
    pub fn quantity_pending(&self) -> i32 {
        self.quantity_ordered - self.quantity_received
    }
}

impl LineFinancials for PurchaseOrderItem {
    fn quantity_ordered(&self) -> i32 {
        self.quantity_ordered
    }

    fn unit_amount(&self) -> Decimal {
        self.unit_cost
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
            PurchaseOrderStatus::Draft,
            PurchaseOrderStatus::PendingApproval,
            PurchaseOrderStatus::Approved,
            PurchaseOrderStatus::SentToSupplier,
            PurchaseOrderStatus::PartiallyReceived,
            PurchaseOrderStatus::FullyReceived,
            PurchaseOrderStatus::Cancelled,
            PurchaseOrderStatus::Closed,
        ] {
            assert_eq!(PurchaseOrderStatus::from_str(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_item_status_from_progress() {
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
}
