//! Validation utilities for the Stockroom back-office
//!
//! Boundary validation only: services reject bad input here before any
//! persistence happens, so no record is ever partially mutated.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a tax rate entered as a percentage string ("22") into the stored
/// fraction (0.22)
///
/// Valid input range is [0, 100] as a percentage; out-of-range input is an
/// error, never clamped.
pub fn parse_tax_rate(input: &str) -> Result<Decimal, &'static str> {
    let percent =
        Decimal::from_str(input.trim()).map_err(|_| "Tax rate must be a number")?;
    validate_tax_percent(percent)?;
    Ok(percent / Decimal::ONE_HUNDRED)
}

/// Validate a tax rate expressed as a percentage in [0, 100]
pub fn validate_tax_percent(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err("Tax rate must be between 0 and 100");
    }
    Ok(())
}

/// Validate a stored tax rate fraction in [0, 1]
pub fn validate_tax_fraction(fraction: Decimal) -> Result<(), &'static str> {
    if fraction < Decimal::ZERO || fraction > Decimal::ONE {
        return Err("Tax rate fraction must be between 0 and 1");
    }
    Ok(())
}

/// Validate a line discount percentage in [0, 100]
pub fn validate_discount_percentage(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err("Discount percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a monetary amount is non-negative
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate an ordered quantity is positive
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a SKU (3-32 characters, uppercase alphanumeric plus dashes)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 3 {
        return Err("SKU must be at least 3 characters");
    }
    if sku.len() > 32 {
        return Err("SKU must be at most 32 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("SKU must be uppercase alphanumeric with dashes");
    }
    Ok(())
}

/// Validate a warehouse code (2-10 uppercase alphanumeric)
pub fn validate_warehouse_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Warehouse code must be at least 2 characters");
    }
    if code.len() > 10 {
        return Err("Warehouse code must be at most 10 characters");
    }
    if !code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err("Warehouse code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}
