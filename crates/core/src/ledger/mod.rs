//! Append-only accounting ledger.
//!
//! This module implements the core ledger functionality:
//! - Ledger entries (credits and debits, sign implied by type)
//! - References back to the causing business event
//! - Balance calculations folded from history
//! - Business rule validation for writes
//! - The storage seam implemented by the db crate and the in-memory store
//! - Error types for every engine operation

pub mod balance;
pub mod entry;
pub mod error;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod balance_props;
#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod validation_props;

pub use balance::{Balance, BalanceCalculator};
pub use entry::{EntryType, LedgerEntry, NewLedgerEntry};
pub use error::{ErrorKind, LedgerError};
pub use store::{LedgerStore, LedgerTx, LockScope};
pub use types::{EntryQuery, EntryReference, ReferenceType};
pub use validation::{
    validate_new_entry, validate_period, validate_reference_id, validate_requested_amount,
};
