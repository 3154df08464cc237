//! Order lifecycle tests
//!
//! Exercises the purchase and sales lifecycle tables: legal transitions,
//! cancellation rules, field editability per status, and terminal states.

use proptest::prelude::*;

use shared::{
    rejected_fields, LifecycleError, PurchaseOrderStatus, SalesOrderStatus, PURCHASE_LIFECYCLE,
    SALES_LIFECYCLE,
};

const ALL_PO_STATUSES: [PurchaseOrderStatus; 8] = [
    PurchaseOrderStatus::Draft,
    PurchaseOrderStatus::PendingApproval,
    PurchaseOrderStatus::Approved,
    PurchaseOrderStatus::SentToSupplier,
    PurchaseOrderStatus::PartiallyReceived,
    PurchaseOrderStatus::FullyReceived,
    PurchaseOrderStatus::Cancelled,
    PurchaseOrderStatus::Closed,
];

const ALL_SO_STATUSES: [SalesOrderStatus; 10] = [
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
];

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_purchase_order_full_path() {
        use PurchaseOrderStatus::*;
        let path = [
            Draft,
            PendingApproval,
            Approved,
            SentToSupplier,
            PartiallyReceived,
            FullyReceived,
            Closed,
        ];
        for pair in path.windows(2) {
            assert!(
                PURCHASE_LIFECYCLE.can_transition(pair[0], pair[1]),
                "{:?} -> {:?} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_purchase_order_may_skip_partial_receipt() {
        use PurchaseOrderStatus::*;
        // A single complete delivery goes straight to fully received
        assert!(PURCHASE_LIFECYCLE.can_transition(SentToSupplier, FullyReceived));
    }

    #[test]
    fn test_sales_order_full_path() {
        use SalesOrderStatus::*;
        let path = [
            Draft,
            PendingApproval,
            Approved,
            Confirmed,
            PartiallyFulfilled,
            FullyFulfilled,
            Shipped,
            Delivered,
            Closed,
        ];
        for pair in path.windows(2) {
            assert!(
                SALES_LIFECYCLE.can_transition(pair[0], pair[1]),
                "{:?} -> {:?} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_no_approval_skipping() {
        use PurchaseOrderStatus::*;
        assert!(!PURCHASE_LIFECYCLE.can_transition(Draft, Approved));
        assert!(!PURCHASE_LIFECYCLE.can_transition(Draft, SentToSupplier));
        assert!(!SALES_LIFECYCLE
            .can_transition(SalesOrderStatus::Draft, SalesOrderStatus::Confirmed));
    }

    #[test]
    fn test_no_backward_transitions() {
        use SalesOrderStatus::*;
        assert!(!SALES_LIFECYCLE.can_transition(Shipped, Confirmed));
        assert!(!SALES_LIFECYCLE.can_transition(Delivered, Draft));
        assert!(!PURCHASE_LIFECYCLE.can_transition(
            PurchaseOrderStatus::FullyReceived,
            PurchaseOrderStatus::SentToSupplier
        ));
    }

    #[test]
    fn test_cancellation_needs_a_reason() {
        use SalesOrderStatus::*;
        assert_eq!(
            SALES_LIFECYCLE.check_transition(Confirmed, Cancelled, None),
            Err(LifecycleError::MissingCancellationReason)
        );
        assert_eq!(
            SALES_LIFECYCLE.check_transition(Confirmed, Cancelled, Some("")),
            Err(LifecycleError::MissingCancellationReason)
        );
        assert!(SALES_LIFECYCLE
            .check_transition(Confirmed, Cancelled, Some("customer withdrew"))
            .is_ok());
    }

    #[test]
    fn test_shipped_orders_cannot_be_cancelled() {
        use SalesOrderStatus::*;
        for status in [FullyFulfilled, Shipped, Delivered] {
            assert!(matches!(
                SALES_LIFECYCLE.check_transition(status, Cancelled, Some("too late")),
                Err(LifecycleError::NotCancellable { .. })
            ));
        }
    }

    #[test]
    fn test_received_purchase_orders_cannot_be_cancelled() {
        use PurchaseOrderStatus::*;
        assert!(matches!(
            PURCHASE_LIFECYCLE.check_transition(FullyReceived, Cancelled, Some("too late")),
            Err(LifecycleError::NotCancellable { .. })
        ));
        // Partial receipt can still be cancelled (remaining quantity written off)
        assert!(PURCHASE_LIFECYCLE
            .check_transition(PartiallyReceived, Cancelled, Some("supplier folded"))
            .is_ok());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(PURCHASE_LIFECYCLE.is_terminal(PurchaseOrderStatus::Cancelled));
        assert!(PURCHASE_LIFECYCLE.is_terminal(PurchaseOrderStatus::Closed));
        assert!(SALES_LIFECYCLE.is_terminal(SalesOrderStatus::Cancelled));
        assert!(SALES_LIFECYCLE.is_terminal(SalesOrderStatus::Closed));
    }

    #[test]
    fn test_editability_ends_at_approval() {
        use PurchaseOrderStatus::*;
        assert!(PURCHASE_LIFECYCLE.is_editable(Draft));
        assert!(PURCHASE_LIFECYCLE.is_editable(PendingApproval));
        for status in [Approved, SentToSupplier, PartiallyReceived, FullyReceived, Cancelled, Closed]
        {
            assert!(!PURCHASE_LIFECYCLE.is_editable(status), "{:?}", status);
        }
    }

    #[test]
    fn test_priority_and_notes_stay_mutable_in_flight() {
        use SalesOrderStatus::*;
        for status in [Approved, Confirmed, PartiallyFulfilled] {
            assert!(SALES_LIFECYCLE.can_mutate(status, "priority"));
            assert!(SALES_LIFECYCLE.can_mutate(status, "notes"));
            assert!(!SALES_LIFECYCLE.can_mutate(status, "items"));
            assert!(!SALES_LIFECYCLE.can_mutate(status, "tax_rate"));
        }
    }

    #[test]
    fn test_rejected_fields_lists_every_locked_field() {
        let rejected = rejected_fields(
            &PURCHASE_LIFECYCLE,
            PurchaseOrderStatus::SentToSupplier,
            &["supplier_name", "notes", "shipping_cost", "priority"],
        );
        assert_eq!(rejected, vec!["supplier_name", "shipping_cost"]);
    }

    #[test]
    fn test_rejected_fields_empty_when_editable() {
        let rejected = rejected_fields(
            &SALES_LIFECYCLE,
            SalesOrderStatus::Draft,
            &["customer_name", "tax_rate", "items"],
        );
        assert!(rejected.is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn po_status_strategy() -> impl Strategy<Value = PurchaseOrderStatus> {
        prop::sample::select(ALL_PO_STATUSES.to_vec())
    }

    fn so_status_strategy() -> impl Strategy<Value = SalesOrderStatus> {
        prop::sample::select(ALL_SO_STATUSES.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Nothing ever leaves a terminal state.
        #[test]
        fn prop_terminal_states_absorb(from in po_status_strategy(), to in po_status_strategy()) {
            if PURCHASE_LIFECYCLE.is_terminal(from) {
                prop_assert!(!PURCHASE_LIFECYCLE.can_transition(from, to));
            }
        }

        /// Self-transitions are never legal; every persisted change of
        /// status is a real move through the table.
        #[test]
        fn prop_no_self_transitions(status in so_status_strategy()) {
            prop_assert!(!SALES_LIFECYCLE.can_transition(status, status));
        }

        /// check_transition agrees with can_transition for non-cancellation
        /// targets.
        #[test]
        fn prop_check_matches_table(from in so_status_strategy(), to in so_status_strategy()) {
            if to != SalesOrderStatus::Cancelled {
                let checked = SALES_LIFECYCLE.check_transition(from, to, None).is_ok();
                prop_assert_eq!(checked, SALES_LIFECYCLE.can_transition(from, to));
            }
        }

        /// Cancellation without a reason is rejected from every status,
        /// whether or not cancellation itself is reachable.
        #[test]
        fn prop_cancel_always_needs_reason(from in po_status_strategy()) {
            let result =
                PURCHASE_LIFECYCLE.check_transition(from, PurchaseOrderStatus::Cancelled, None);
            prop_assert!(result.is_err());
        }

        /// Terminal states lock every field.
        #[test]
        fn prop_terminal_states_lock_all_fields(status in so_status_strategy()) {
            if SALES_LIFECYCLE.is_terminal(status) {
                prop_assert!(SALES_LIFECYCLE.mutable_fields(status).is_empty());
            }
        }
    }
}
