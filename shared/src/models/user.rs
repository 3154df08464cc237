//! User and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user account on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Roles with fixed permission sets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Operator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Operator => "operator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "manager" => Some(UserRole::Manager),
            "operator" => Some(UserRole::Operator),
            _ => None,
        }
    }

    /// Permission strings (`resource:action`) granted by this role.
    ///
    /// Admins additionally bypass ownership scoping on orders; that bypass
    /// never widens which statuses are editable.
    pub fn permissions(&self) -> Vec<String> {
        let grants: &[(&str, &[&str])] = match self {
            UserRole::Admin => &[
                ("products", &["view", "create", "edit", "delete"]),
                ("warehouses", &["view", "create", "edit", "delete"]),
                ("inventory", &["view", "adjust", "transfer"]),
                (
                    "purchase_orders",
                    &["view", "create", "edit", "approve", "receive", "cancel", "delete"],
                ),
                (
                    "sales_orders",
                    &["view", "create", "edit", "approve", "fulfill", "cancel", "delete"],
                ),
            ],
            UserRole::Manager => &[
                ("products", &["view", "create", "edit"]),
                ("warehouses", &["view", "create", "edit"]),
                ("inventory", &["view", "adjust", "transfer"]),
                (
                    "purchase_orders",
                    &["view", "create", "edit", "approve", "receive", "cancel"],
                ),
                (
                    "sales_orders",
                    &["view", "create", "edit", "approve", "fulfill", "cancel"],
                ),
            ],
            UserRole::Operator => &[
                ("products", &["view"]),
                ("warehouses", &["view"]),
                ("inventory", &["view"]),
                ("purchase_orders", &["view", "create", "edit"]),
                ("sales_orders", &["view", "create", "edit"]),
            ],
        };

        grants
            .iter()
            .flat_map(|(resource, actions)| {
                actions
                    .iter()
                    .map(move |action| format!("{}:{}", resource, action))
            })
            .collect()
    }

    /// Whether this role may act on orders owned by other users
    pub fn bypasses_ownership(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::Admin, UserRole::Manager, UserRole::Operator] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_operator_cannot_approve() {
        let perms = UserRole::Operator.permissions();
        assert!(!perms.contains(&"purchase_orders:approve".to_string()));
        assert!(perms.contains(&"purchase_orders:view".to_string()));
    }

    #[test]
    fn test_ownership_bypass() {
        assert!(UserRole::Admin.bypasses_ownership());
        assert!(!UserRole::Operator.bypasses_ownership());
    }
}
