//! Order lifecycle rules
//!
//! The state machine is data, not conditionals: one table per order type
//! mapping each status to its legal next statuses and the fields that may be
//! mutated while in it. Services consult the table; nothing else in the
//! codebase decides what a status allows.

use thiserror::Error;

use crate::models::{PurchaseOrderStatus, SalesOrderStatus};

/// A lifecycle rule violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("order in status {status} does not permit editing fields: {}", fields.join(", "))]
    FieldsNotEditable {
        status: String,
        fields: Vec<String>,
    },

    #[error("order in status {status} cannot be cancelled")]
    NotCancellable { status: String },

    #[error("cancellation requires a reason")]
    MissingCancellationReason,
}

/// One row of a lifecycle table
pub struct LifecycleEntry<S: 'static> {
    pub state: S,
    /// Legal forward transitions out of this state
    pub next: &'static [S],
    /// Fields that may be mutated while in this state
    pub mutable_fields: &'static [&'static str],
}

/// A lifecycle table for one order type
pub struct Lifecycle<S: Copy + Eq + 'static> {
    entries: &'static [LifecycleEntry<S>],
}

impl<S: Copy + Eq + 'static> Lifecycle<S> {
    pub const fn new(entries: &'static [LifecycleEntry<S>]) -> Self {
        Self { entries }
    }

    fn entry(&self, state: S) -> Option<&LifecycleEntry<S>> {
        self.entries.iter().find(|e| e.state == state)
    }

    /// Legal next statuses out of `state`
    pub fn next_states(&self, state: S) -> &'static [S] {
        self.entry(state).map(|e| e.next).unwrap_or(&[])
    }

    /// Whether `from -> to` is a legal transition
    pub fn can_transition(&self, from: S, to: S) -> bool {
        self.next_states(from).contains(&to)
    }

    /// Fields that may be mutated while in `state`
    pub fn mutable_fields(&self, state: S) -> &'static [&'static str] {
        self.entry(state).map(|e| e.mutable_fields).unwrap_or(&[])
    }

    /// Whether a field may be mutated while in `state`
    pub fn can_mutate(&self, state: S, field: &str) -> bool {
        self.mutable_fields(state).contains(&field)
    }

    /// No forward transition leaves this state
    pub fn is_terminal(&self, state: S) -> bool {
        self.next_states(state).is_empty()
    }

    /// Line items and financial fields may be edited in this state
    pub fn is_editable(&self, state: S) -> bool {
        self.can_mutate(state, "items")
    }
}

/// Full field mutation set for orders in an editable status
const EDITABLE_PO_FIELDS: &[&str] = &[
    "supplier_name",
    "warehouse_id",
    "priority",
    "expected_date",
    "notes",
    "tax_rate",
    "shipping_cost",
    "discount_amount",
    "items",
];

const EDITABLE_SO_FIELDS: &[&str] = &[
    "customer_name",
    "customer_email",
    "warehouse_id",
    "priority",
    "expected_date",
    "notes",
    "tax_rate",
    "shipping_cost",
    "discount_amount",
    "items",
];

/// Priority and notes stay mutable on in-flight orders; everything else is
/// locked once the order leaves the editable statuses.
const IN_FLIGHT_FIELDS: &[&str] = &["priority", "notes"];

/// Purchase order lifecycle table
pub static PURCHASE_LIFECYCLE: Lifecycle<PurchaseOrderStatus> = Lifecycle::new(&[
    LifecycleEntry {
        state: PurchaseOrderStatus::Draft,
        next: &[
            PurchaseOrderStatus::PendingApproval,
            PurchaseOrderStatus::Cancelled,
        ],
        mutable_fields: EDITABLE_PO_FIELDS,
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::PendingApproval,
        next: &[
            PurchaseOrderStatus::Approved,
            PurchaseOrderStatus::Cancelled,
        ],
        mutable_fields: EDITABLE_PO_FIELDS,
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::Approved,
        next: &[
            PurchaseOrderStatus::SentToSupplier,
            PurchaseOrderStatus::Cancelled,
        ],
        mutable_fields: IN_FLIGHT_FIELDS,
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::SentToSupplier,
        next: &[
            PurchaseOrderStatus::PartiallyReceived,
            PurchaseOrderStatus::FullyReceived,
            PurchaseOrderStatus::Cancelled,
        ],
        mutable_fields: IN_FLIGHT_FIELDS,
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::PartiallyReceived,
        next: &[
            PurchaseOrderStatus::FullyReceived,
            PurchaseOrderStatus::Cancelled,
        ],
        mutable_fields: IN_FLIGHT_FIELDS,
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::FullyReceived,
        next: &[PurchaseOrderStatus::Closed],
        mutable_fields: &[],
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::Cancelled,
        next: &[],
        mutable_fields: &[],
    },
    LifecycleEntry {
        state: PurchaseOrderStatus::Closed,
        next: &[],
        mutable_fields: &[],
    },
]);

/// Sales order lifecycle table
pub static SALES_LIFECYCLE: Lifecycle<SalesOrderStatus> = Lifecycle::new(&[
    LifecycleEntry {
        state: SalesOrderStatus::Draft,
        next: &[
            SalesOrderStatus::PendingApproval,
            SalesOrderStatus::Cancelled,
        ],
        mutable_fields: EDITABLE_SO_FIELDS,
    },
    LifecycleEntry {
        state: SalesOrderStatus::PendingApproval,
        next: &[SalesOrderStatus::Approved, SalesOrderStatus::Cancelled],
        mutable_fields: EDITABLE_SO_FIELDS,
    },
    LifecycleEntry {
        state: SalesOrderStatus::Approved,
        next: &[SalesOrderStatus::Confirmed, SalesOrderStatus::Cancelled],
        mutable_fields: IN_FLIGHT_FIELDS,
    },
    LifecycleEntry {
        state: SalesOrderStatus::Confirmed,
        next: &[
            SalesOrderStatus::PartiallyFulfilled,
            SalesOrderStatus::FullyFulfilled,
            SalesOrderStatus::Cancelled,
        ],
        mutable_fields: IN_FLIGHT_FIELDS,
    },
    LifecycleEntry {
        state: SalesOrderStatus::PartiallyFulfilled,
        next: &[
            SalesOrderStatus::FullyFulfilled,
            SalesOrderStatus::Cancelled,
        ],
        mutable_fields: IN_FLIGHT_FIELDS,
    },
    LifecycleEntry {
        state: SalesOrderStatus::FullyFulfilled,
        next: &[SalesOrderStatus::Shipped],
        mutable_fields: &[],
    },
    LifecycleEntry {
        state: SalesOrderStatus::Shipped,
        next: &[SalesOrderStatus::Delivered],
        mutable_fields: &[],
    },
    LifecycleEntry {
        state: SalesOrderStatus::Delivered,
        next: &[SalesOrderStatus::Closed],
        mutable_fields: &[],
    },
    LifecycleEntry {
        state: SalesOrderStatus::Cancelled,
        next: &[],
        mutable_fields: &[],
    },
    LifecycleEntry {
        state: SalesOrderStatus::Closed,
        next: &[],
        mutable_fields: &[],
    },
]);

impl Lifecycle<PurchaseOrderStatus> {
    /// Validate a purchase order transition, including cancellation rules
    pub fn check_transition(
        &self,
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        cancellation_reason: Option<&str>,
    ) -> Result<(), LifecycleError> {
        check(self, from, to, cancellation_reason, PurchaseOrderStatus::Cancelled,
            |s| s.as_str().to_string())
    }
}

impl Lifecycle<SalesOrderStatus> {
    /// Validate a sales order transition, including cancellation rules
    pub fn check_transition(
        &self,
        from: SalesOrderStatus,
        to: SalesOrderStatus,
        cancellation_reason: Option<&str>,
    ) -> Result<(), LifecycleError> {
        check(self, from, to, cancellation_reason, SalesOrderStatus::Cancelled,
            |s| s.as_str().to_string())
    }
}

fn check<S: Copy + Eq + 'static>(
    table: &Lifecycle<S>,
    from: S,
    to: S,
    cancellation_reason: Option<&str>,
    cancelled: S,
    name: impl Fn(S) -> String,
) -> Result<(), LifecycleError> {
    if to == cancelled {
        if !table.can_transition(from, cancelled) {
            return Err(LifecycleError::NotCancellable { status: name(from) });
        }
        match cancellation_reason {
            Some(reason) if !reason.trim().is_empty() => return Ok(()),
            _ => return Err(LifecycleError::MissingCancellationReason),
        }
    }

    if table.can_transition(from, to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            from: name(from),
            to: name(to),
        })
    }
}

/// Collect the fields of an attempted update that are not mutable in `state`
pub fn rejected_fields<S: Copy + Eq + 'static>(
    table: &Lifecycle<S>,
    state: S,
    touched: &[&str],
) -> Vec<String> {
    touched
        .iter()
        .filter(|f| !table.can_mutate(state, f))
        .map(|f| f.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_happy_path() {
        use PurchaseOrderStatus::*;
        let path = [
            (Draft, PendingApproval),
            (PendingApproval, Approved),
            (Approved, SentToSupplier),
            (SentToSupplier, PartiallyReceived),
            (PartiallyReceived, FullyReceived),
            (FullyReceived, Closed),
        ];
        for (from, to) in path {
            assert!(PURCHASE_LIFECYCLE.can_transition(from, to), "{:?} -> {:?}", from, to);
        }
    }

    #[test]
    fn test_purchase_no_backwards() {
        use PurchaseOrderStatus::*;
        assert!(!PURCHASE_LIFECYCLE.can_transition(Approved, Draft));
        assert!(!PURCHASE_LIFECYCLE.can_transition(FullyReceived, SentToSupplier));
        assert!(!PURCHASE_LIFECYCLE.can_transition(Closed, Draft));
    }

    #[test]
    fn test_purchase_no_skipping_approval() {
        use PurchaseOrderStatus::*;
        assert!(!PURCHASE_LIFECYCLE.can_transition(Draft, Approved));
        assert!(!PURCHASE_LIFECYCLE.can_transition(Draft, SentToSupplier));
    }

    #[test]
    fn test_sales_happy_path() {
        use SalesOrderStatus::*;
        let path = [
            (Draft, PendingApproval),
            (PendingApproval, Approved),
            (Approved, Confirmed),
            (Confirmed, PartiallyFulfilled),
            (PartiallyFulfilled, FullyFulfilled),
            (FullyFulfilled, Shipped),
            (Shipped, Delivered),
            (Delivered, Closed),
        ];
        for (from, to) in path {
            assert!(SALES_LIFECYCLE.can_transition(from, to), "{:?} -> {:?}", from, to);
        }
    }

    #[test]
    fn test_cancel_requires_reason() {
        use PurchaseOrderStatus::*;
        assert_eq!(
            PURCHASE_LIFECYCLE.check_transition(Draft, Cancelled, None),
            Err(LifecycleError::MissingCancellationReason)
        );
        assert_eq!(
            PURCHASE_LIFECYCLE.check_transition(Draft, Cancelled, Some("  ")),
            Err(LifecycleError::MissingCancellationReason)
        );
        assert!(PURCHASE_LIFECYCLE
            .check_transition(Draft, Cancelled, Some("duplicate order"))
            .is_ok());
    }

    #[test]
    fn test_no_cancel_from_terminal_or_received() {
        use PurchaseOrderStatus::*;
        for status in [FullyReceived, Cancelled, Closed] {
            assert!(matches!(
                PURCHASE_LIFECYCLE.check_transition(status, Cancelled, Some("reason")),
                Err(LifecycleError::NotCancellable { .. })
            ));
        }
    }

    #[test]
    fn test_sales_cancel_reachable_from_in_flight() {
        use SalesOrderStatus::*;
        for status in [Draft, PendingApproval, Approved, Confirmed, PartiallyFulfilled] {
            assert!(SALES_LIFECYCLE
                .check_transition(status, Cancelled, Some("customer request"))
                .is_ok());
        }
        for status in [FullyFulfilled, Shipped, Delivered, Cancelled, Closed] {
            assert!(SALES_LIFECYCLE
                .check_transition(status, Cancelled, Some("customer request"))
                .is_err());
        }
    }

    #[test]
    fn test_terminal_states() {
        use SalesOrderStatus::*;
        assert!(SALES_LIFECYCLE.is_terminal(Cancelled));
        assert!(SALES_LIFECYCLE.is_terminal(Closed));
        assert!(!SALES_LIFECYCLE.is_terminal(Delivered)); // may still be closed
        assert!(PURCHASE_LIFECYCLE.is_terminal(PurchaseOrderStatus::Cancelled));
    }

    #[test]
    fn test_editable_statuses() {
        use PurchaseOrderStatus::*;
        assert!(PURCHASE_LIFECYCLE.is_editable(Draft));
        assert!(PURCHASE_LIFECYCLE.is_editable(PendingApproval));
        assert!(!PURCHASE_LIFECYCLE.is_editable(Approved));
        assert!(!PURCHASE_LIFECYCLE.is_editable(SentToSupplier));
        assert!(!PURCHASE_LIFECYCLE.is_editable(Cancelled));
    }

    #[test]
    fn test_priority_mutable_in_flight() {
        use SalesOrderStatus::*;
        assert!(SALES_LIFECYCLE.can_mutate(Confirmed, "priority"));
        assert!(SALES_LIFECYCLE.can_mutate(Confirmed, "notes"));
        assert!(!SALES_LIFECYCLE.can_mutate(Confirmed, "customer_name"));
        assert!(!SALES_LIFECYCLE.can_mutate(Delivered, "priority"));
    }

    #[test]
    fn test_rejected_fields_names_every_offender() {
        use SalesOrderStatus::*;
        let rejected = rejected_fields(
            &SALES_LIFECYCLE,
            Confirmed,
            &["customer_name", "tax_rate", "notes"],
        );
        assert_eq!(rejected, vec!["customer_name".to_string(), "tax_rate".to_string()]);
    }

    #[test]
    fn test_terminal_states_reject_all_mutation() {
        use SalesOrderStatus::*;
        for status in [Cancelled, Closed] {
            assert!(SALES_LIFECYCLE.mutable_fields(status).is_empty());
        }
    }
}
