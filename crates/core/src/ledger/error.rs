//! Ledger error types.
//!
//! This module defines every error the balance engine can raise: input
//! validation, insufficient balance, reservation state conflicts, lookups of
//! unknown reservations, and storage failures.

use entitle_shared::types::BalanceType;
use rust_decimal::Decimal;
use thiserror::Error;

use super::entry::EntryType;
use crate::reservation::ReservationStatus;

/// Broad classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; retrying the same request cannot succeed.
    Validation,
    /// Not enough spendable balance.
    InsufficientBalance,
    /// The request contradicts state already recorded.
    Conflict,
    /// A referenced record does not exist.
    NotFound,
    /// Infrastructure failure.
    Internal,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry amount cannot be negative.
    #[error("Entry amount cannot be negative")]
    NegativeAmount,

    /// Requested amount must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Amount carries more decimal places than the ledger stores.
    #[error("Amount {0} has more than 4 decimal places")]
    ExcessivePrecision(Decimal),

    /// Accrual period outside the supported year range.
    #[error("Invalid accrual period: {0}")]
    InvalidPeriod(i32),

    /// Reference is missing or malformed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A credit entry type was required.
    #[error("Entry type {0} is not a credit")]
    CreditEntryRequired(EntryType),

    /// A debit entry type was required.
    #[error("Entry type {0} is not a debit")]
    DebitEntryRequired(EntryType),

    /// Balance type string not recognized.
    #[error("Unknown balance type: {0}")]
    UnknownBalanceType(String),

    // ========== Balance Errors ==========
    /// Not enough spendable balance to cover the request.
    #[error("Insufficient {balance_type} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Balance type (or pool head) the request was made against.
        balance_type: BalanceType,
        /// Requested amount.
        requested: Decimal,
        /// Amount available after open reservations.
        available: Decimal,
    },

    // ========== Reservation Errors ==========
    /// No reservation exists for the reference.
    #[error("Reservation not found for reference {0}")]
    ReservationNotFound(String),

    /// A reservation with the same reference exists with different terms.
    #[error(
        "Reservation {reference_id} already exists with amount {existing}, requested {requested}"
    )]
    ReservationMismatch {
        /// Reference of the existing reservation.
        reference_id: String,
        /// Amount of the existing reservation.
        existing: Decimal,
        /// Amount in the conflicting request.
        requested: Decimal,
    },

    /// The reservation was already resolved in a way that forbids the request.
    #[error("Reservation {reference_id} is already {status}")]
    ReservationAlreadyResolved {
        /// Reference of the reservation.
        reference_id: String,
        /// Terminal status it is in.
        status: ReservationStatus,
    },

    /// Another writer created the reservation concurrently.
    #[error("Reservation {0} was created concurrently, please retry")]
    DuplicateReservation(String),

    // ========== Concurrency Errors ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Infrastructure Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// External policy engine error.
    #[error("Policy engine error: {0}")]
    Policy(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the broad classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NegativeAmount
            | Self::NonPositiveAmount(_)
            | Self::ExcessivePrecision(_)
            | Self::InvalidPeriod(_)
            | Self::InvalidReference(_)
            | Self::CreditEntryRequired(_)
            | Self::DebitEntryRequired(_)
            | Self::UnknownBalanceType(_) => ErrorKind::Validation,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::ReservationMismatch { .. }
            | Self::ReservationAlreadyResolved { .. }
            | Self::DuplicateReservation(_)
            | Self::ConcurrentModification => ErrorKind::Conflict,
            Self::ReservationNotFound(_) => ErrorKind::NotFound,
            Self::Database(_) | Self::Policy(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::ExcessivePrecision(_) => "EXCESSIVE_PRECISION",
            Self::InvalidPeriod(_) => "INVALID_PERIOD",
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::CreditEntryRequired(_) => "CREDIT_ENTRY_REQUIRED",
            Self::DebitEntryRequired(_) => "DEBIT_ENTRY_REQUIRED",
            Self::UnknownBalanceType(_) => "UNKNOWN_BALANCE_TYPE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
            Self::ReservationMismatch { .. } => "RESERVATION_MISMATCH",
            Self::ReservationAlreadyResolved { .. } => "RESERVATION_ALREADY_RESOLVED",
            Self::DuplicateReservation(_) => "DUPLICATE_RESERVATION",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Policy(_) => "POLICY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::InsufficientBalance => 422,
            ErrorKind::Internal => match self {
                Self::Policy(_) => 502,
                _ => 500,
            },
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification | Self::DuplicateReservation(_)
        )
    }

    /// For insufficient-balance errors, how much is missing.
    #[must_use]
    pub fn shortfall(&self) -> Option<Decimal> {
        match self {
            Self::InsufficientBalance {
                requested,
                available,
                ..
            } => Some(*requested - *available),
            _ => None,
        }
    }
}
