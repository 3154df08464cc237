//! Inventory and stock movement models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-hand stock of a product in one warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// One entry in the append-only stock movement journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    /// Signed by direction at the business level; stored positive, the
    /// movement type carries the direction
    pub quantity: i32,
    /// Reference code of the order that caused the movement, if any
    pub order_reference: Option<String>,
    pub reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Kinds of stock movements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received against a purchase order
    Receipt,
    /// Goods issued against a sales order
    Issue,
    /// Manual correction with a reason
    Adjustment,
    TransferIn,
    TransferOut,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Receipt => "receipt",
            MovementType::Issue => "issue",
            MovementType::Adjustment => "adjustment",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receipt" => Some(MovementType::Receipt),
            "issue" => Some(MovementType::Issue),
            "adjustment" => Some(MovementType::Adjustment),
            "transfer_in" => Some(MovementType::TransferIn),
            "transfer_out" => Some(MovementType::TransferOut),
            _ => None,
        }
    }

    /// Whether this movement adds to the warehouse balance
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MovementType::Receipt | MovementType::TransferIn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_type_round_trip() {
        for t in [
            MovementType::Receipt,
            MovementType::Issue,
            MovementType::Adjustment,
            MovementType::TransferIn,
            MovementType::TransferOut,
        ] {
            assert_eq!(MovementType::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_movement_direction() {
        assert!(MovementType::Receipt.is_inbound());
        assert!(MovementType::TransferIn.is_inbound());
        assert!(!MovementType::Issue.is_inbound());
        assert!(!MovementType::TransferOut.is_inbound());
    }
}
