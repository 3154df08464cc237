//! Reference code generation for orders
//!
//! Codes have the form `<PREFIX>-<YYYY><MM>-<NNN>`, e.g. `PO-202501-001`.
//! The trailing sequence restarts each calendar month per prefix: the next
//! code is derived from the highest existing sequence in the same year-month
//! bucket.
//!
//! Deriving the next sequence by reading the latest existing code is not safe
//! under concurrent creation; two requests can compute the same value. The
//! `reference` columns carry a UNIQUE constraint so the loser surfaces as a
//! conflict instead of a silent duplicate.

use chrono::{DateTime, Datelike, Utc};

/// Width of the zero-padded sequence segment
pub const SEQUENCE_WIDTH: usize = 3;

/// Year-month bucket token, e.g. "202501"
pub fn period_token(at: DateTime<Utc>) -> String {
    format!("{:04}{:02}", at.year(), at.month())
}

/// Format a full reference code
pub fn format_reference(prefix: &str, at: DateTime<Utc>, sequence: u32) -> String {
    format!("{}-{}-{:03}", prefix, period_token(at), sequence)
}

/// Extract the trailing sequence number from a reference code
pub fn parse_sequence(reference: &str) -> Option<u32> {
    let tail = reference.rsplit('-').next()?;
    if tail.len() != SEQUENCE_WIDTH || !tail.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Next sequence given the latest reference in the bucket, if any
///
/// The first code of a new month/prefix combination starts at 001. A latest
/// code whose tail cannot be parsed also restarts at 001 rather than failing
/// order creation.
pub fn next_sequence(latest: Option<&str>) -> u32 {
    latest
        .and_then(parse_sequence)
        .map(|n| n + 1)
        .unwrap_or(1)
}

/// Whether a string matches `^[A-Z]+-\d{6}-\d{3}$`
pub fn is_valid_reference(reference: &str) -> bool {
    let mut parts = reference.split('-');
    let (Some(prefix), Some(period), Some(seq), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_uppercase())
        && period.len() == 6
        && period.chars().all(|c| c.is_ascii_digit())
        && seq.len() == SEQUENCE_WIDTH
        && seq.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jan_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_period_token() {
        assert_eq!(period_token(jan_2025()), "202501");
        let dec = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(period_token(dec), "202412");
    }

    #[test]
    fn test_format_reference() {
        assert_eq!(format_reference("PO", jan_2025(), 1), "PO-202501-001");
        assert_eq!(format_reference("SO", jan_2025(), 42), "SO-202501-042");
    }

    #[test]
    fn test_first_of_month_starts_at_one() {
        assert_eq!(next_sequence(None), 1);
    }

    #[test]
    fn test_next_sequence_increments() {
        assert_eq!(next_sequence(Some("PO-202501-001")), 2);
        assert_eq!(next_sequence(Some("PO-202501-099")), 100);
    }

    #[test]
    fn test_next_sequence_garbage_restarts() {
        assert_eq!(next_sequence(Some("PO-202501-xyz")), 1);
        assert_eq!(next_sequence(Some("")), 1);
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(parse_sequence("PO-202501-007"), Some(7));
        assert_eq!(parse_sequence("PO-202501-1234"), None);
        assert_eq!(parse_sequence("PO-202501"), None);
    }

    #[test]
    fn test_is_valid_reference() {
        assert!(is_valid_reference("PO-202501-001"));
        assert!(is_valid_reference("SO-202412-999"));
        assert!(!is_valid_reference("po-202501-001"));
        assert!(!is_valid_reference("PO-2025-001"));
        assert!(!is_valid_reference("PO-202501-01"));
        assert!(!is_valid_reference("PO-202501-001-extra"));
        assert!(!is_valid_reference("-202501-001"));
    }

    #[test]
    fn test_generated_references_are_valid() {
        for seq in [1, 10, 999] {
            assert!(is_valid_reference(&format_reference("PO", jan_2025(), seq)));
        }
    }
}
