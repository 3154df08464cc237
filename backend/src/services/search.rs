//! Predicate-to-SQL translation for list endpoints
//!
//! Filter objects are translated into [`Predicate`] lists in the shared
//! crate, where the mapping is pure and unit-tested. This module is the only
//! place predicates touch SQL: each one becomes an `AND` clause appended to a
//! base query that already carries a `WHERE`.

use chrono::Days;
use sqlx::{Postgres, QueryBuilder};

use shared::filter::Predicate;

/// Append every predicate as an `AND` clause with bound parameters
///
/// Column names in predicates are static strings chosen by the shared
/// translator, never user input; only values are bound.
pub fn apply_predicates(qb: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate]) {
    for predicate in predicates {
        qb.push(" AND ");
        match predicate {
            Predicate::TextContains { column, value } => {
                qb.push(*column)
                    .push(" ILIKE ")
                    .push_bind(format!("%{}%", value));
            }
            Predicate::MoneyMin { column, value } => {
                qb.push(*column).push(" >= ").push_bind(*value);
            }
            Predicate::MoneyMax { column, value } => {
                qb.push(*column).push(" <= ").push_bind(*value);
            }
            Predicate::IntMin { column, value } => {
                qb.push(*column).push(" >= ").push_bind(*value);
            }
            Predicate::IntMax { column, value } => {
                qb.push(*column).push(" <= ").push_bind(*value);
            }
            Predicate::DateMin { column, value } => {
                qb.push(*column).push(" >= ").push_bind(*value);
            }
            Predicate::DateMax { column, value } => {
                // Inclusive upper bound on a timestamp column: strictly
                // before the start of the following day
                let next_day = value.checked_add_days(Days::new(1)).unwrap_or(*value);
                qb.push(*column).push(" < ").push_bind(next_day);
            }
            Predicate::OneOfStr { column, values } => {
                qb.push(*column)
                    .push(" = ANY(")
                    .push_bind(values.clone())
                    .push(")");
            }
            Predicate::OneOfUuid { column, values } => {
                qb.push(*column)
                    .push(" = ANY(")
                    .push_bind(values.clone())
                    .push(")");
            }
            Predicate::EqualsStr { column, value } => {
                qb.push(*column).push(" = ").push_bind(value.clone());
            }
            Predicate::EqualsUuid { column, value } => {
                qb.push(*column).push(" = ").push_bind(*value);
            }
            Predicate::EqualsBool { column, value } => {
                qb.push(*column).push(" = ").push_bind(*value);
            }
        }
    }
}

/// Append `ORDER BY ... LIMIT ... OFFSET ...` for a page of results
pub fn apply_page(
    qb: &mut QueryBuilder<'_, Postgres>,
    order_by: &str,
    pagination: &shared::types::Pagination,
) {
    qb.push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(i64::from(pagination.per_page))
        .push(" OFFSET ")
        .push_bind(i64::from(pagination.offset()));
}
