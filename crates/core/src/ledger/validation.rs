//! Business rule validation for ledger writes.

use rust_decimal::Decimal;

use super::entry::NewLedgerEntry;
use super::error::LedgerError;

/// Decimal places the ledger stores amounts with.
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Earliest accrual period accepted.
pub const MIN_PERIOD: i32 = 1900;

/// Latest accrual period accepted.
pub const MAX_PERIOD: i32 = 9999;

/// Validates an entry before it is appended.
///
/// Zero amounts are accepted; negative amounts never are.
///
/// # Errors
///
/// Returns an error if the amount is negative or too precise, the period is
/// out of range, the reference is blank, or a credit claims to be drawn from
/// a bucket.
pub fn validate_new_entry(entry: &NewLedgerEntry) -> Result<(), LedgerError> {
    if entry.amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount);
    }
    validate_amount_scale(entry.amount)?;
    validate_period(entry.period)?;

    validate_reference_id(&entry.reference.reference_id)?;

    if entry.entry_type.is_credit() && entry.drawn_from.is_some() {
        return Err(LedgerError::DebitEntryRequired(entry.entry_type));
    }

    Ok(())
}

/// Validates an amount requested for consumption or reservation.
///
/// # Errors
///
/// Returns `NonPositiveAmount` unless `amount > 0`, and `ExcessivePrecision`
/// for amounts with more than four decimal places.
pub fn validate_requested_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    validate_amount_scale(amount)
}

/// Trailing zeros do not count: `1.50000` is as precise as `1.5`.
fn validate_amount_scale(amount: Decimal) -> Result<(), LedgerError> {
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(LedgerError::ExcessivePrecision(amount));
    }
    Ok(())
}

/// Validates an accrual period (fiscal year).
///
/// # Errors
///
/// Returns `InvalidPeriod` outside `MIN_PERIOD..=MAX_PERIOD`.
pub fn validate_period(period: i32) -> Result<(), LedgerError> {
    if !(MIN_PERIOD..=MAX_PERIOD).contains(&period) {
        return Err(LedgerError::InvalidPeriod(period));
    }
    Ok(())
}

/// Validates a business-event reference id.
///
/// # Errors
///
/// Returns `InvalidReference` for blank ids or ids longer than 128 characters.
pub fn validate_reference_id(reference_id: &str) -> Result<(), LedgerError> {
    if reference_id.trim().is_empty() {
        return Err(LedgerError::InvalidReference(
            "reference id cannot be blank".to_string(),
        ));
    }
    if reference_id.chars().count() > 128 {
        return Err(LedgerError::InvalidReference(format!(
            "reference id exceeds 128 characters: {reference_id}"
        )));
    }
    Ok(())
}
