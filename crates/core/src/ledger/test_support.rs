//! Builders for ledger fixtures used across unit tests.

use chrono::{DateTime, TimeZone, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId, SubjectId};
use rust_decimal::Decimal;

use super::entry::{EntryType, LedgerEntry, NewLedgerEntry};
use super::types::{EntryReference, ReferenceType};

/// Midnight UTC of the given day.
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// A new entry in period 2025 dated January 1st.
pub fn new_entry(
    subject_id: SubjectId,
    balance_type: BalanceType,
    entry_type: EntryType,
    amount: Decimal,
) -> NewLedgerEntry {
    NewLedgerEntry {
        subject_id,
        period: 2025,
        balance_type,
        entry_type,
        amount,
        reference: EntryReference::new(ReferenceType::ManualAdjustment, "fixture"),
        drawn_from: None,
        expires_on: None,
        created_by: None,
        created_at: day(2025, 1, 1),
        notes: None,
    }
}

/// A persisted entry with a fresh id.
pub fn entry(
    subject_id: SubjectId,
    period: i32,
    balance_type: BalanceType,
    entry_type: EntryType,
    amount: Decimal,
) -> LedgerEntry {
    let mut new = new_entry(subject_id, balance_type, entry_type, amount);
    new.period = period;
    LedgerEntry::from_new(LedgerEntryId::new(), new)
}
