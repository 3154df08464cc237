//! Order concepts shared by purchase and sales orders

use serde::{Deserialize, Serialize};

/// Order priority, independent of lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl OrderPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPriority::Low => "low",
            OrderPriority::Normal => "normal",
            OrderPriority::High => "high",
            OrderPriority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(OrderPriority::Low),
            "normal" => Some(OrderPriority::Normal),
            "high" => Some(OrderPriority::High),
            "urgent" => Some(OrderPriority::Urgent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trip() {
        for p in [
            OrderPriority::Low,
            OrderPriority::Normal,
            OrderPriority::High,
            OrderPriority::Urgent,
        ] {
            assert_eq!(OrderPriority::from_str(p.as_str()), Some(p));
        }
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(OrderPriority::default(), OrderPriority::Normal);
    }
}
