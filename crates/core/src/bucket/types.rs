//! Bucket views and allocation results.

use chrono::{DateTime, NaiveDate, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId, PriorityClass, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{EntryReference, EntryType, NewLedgerEntry};

/// Note carried by the debit row that covers a shortfall.
pub const OVERDRAFT_NOTE: &str = "overdraft";

/// Allocatable view of a single credit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// The credit entry this bucket is built from.
    pub entry_id: LedgerEntryId,
    /// Owner of the entitlement.
    pub subject_id: SubjectId,
    /// Balance type of the credit.
    pub balance_type: BalanceType,
    /// Period of the credit.
    pub period: i32,
    /// Kind of credit.
    pub entry_type: EntryType,
    /// Credited amount.
    pub original_amount: Decimal,
    /// Sum of debits drawn from this bucket.
    pub consumed_amount: Decimal,
    /// `original_amount - consumed_amount`; negative only after an overdraft.
    pub remaining_amount: Decimal,
    /// Consumption priority.
    pub priority_class: PriorityClass,
    /// Last valid day, if the bucket expires.
    pub expiry_date: Option<NaiveDate>,
    /// Effective timestamp of the credit.
    pub created_at: DateTime<Utc>,
}

impl Bucket {
    /// Returns true if the bucket's last valid day is before `as_of`.
    #[must_use]
    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|d| d < as_of)
    }

    /// Returns true if more was drawn than credited.
    #[must_use]
    pub fn is_overdrawn(&self) -> bool {
        self.remaining_amount < Decimal::ZERO
    }

    /// Sort key for consumption order.
    #[must_use]
    pub fn consumption_key(&self) -> (PriorityClass, DateTime<Utc>, LedgerEntryId) {
        (self.priority_class, self.created_at, self.entry_id)
    }
}

/// One portion of a consumption, becoming one debit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Bucket drawn from; `None` for an overdraft on an empty pool.
    pub drawn_from: Option<LedgerEntryId>,
    /// Balance type of the debit row (the bucket's type).
    pub balance_type: BalanceType,
    /// Period of the debit row (the bucket's period).
    pub period: i32,
    /// Amount drawn.
    pub amount: Decimal,
    /// True for the synthetic row covering a shortfall.
    pub overdraft: bool,
}

impl Attribution {
    /// A regular draw from a bucket.
    #[must_use]
    pub fn draw(bucket: &Bucket, amount: Decimal) -> Self {
        Self {
            drawn_from: Some(bucket.entry_id),
            balance_type: bucket.balance_type,
            period: bucket.period,
            amount,
            overdraft: false,
        }
    }

    /// The overdraft row for a shortfall, against `bucket` when there is one.
    #[must_use]
    pub fn overdraft(
        bucket: Option<&Bucket>,
        fallback_type: BalanceType,
        fallback_period: i32,
        amount: Decimal,
    ) -> Self {
        Self {
            drawn_from: bucket.map(|b| b.entry_id),
            balance_type: bucket.map_or(fallback_type, |b| b.balance_type),
            period: bucket.map_or(fallback_period, |b| b.period),
            amount,
            overdraft: true,
        }
    }

    /// The debit row this attribution becomes.
    #[must_use]
    pub fn debit_entry(
        &self,
        subject_id: SubjectId,
        entry_type: EntryType,
        reference: &EntryReference,
        created_by: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            subject_id,
            period: self.period,
            balance_type: self.balance_type,
            entry_type,
            amount: self.amount,
            reference: reference.clone(),
            drawn_from: self.drawn_from,
            expires_on: None,
            created_by,
            created_at,
            notes: self.overdraft.then(|| OVERDRAFT_NOTE.to_string()),
        }
    }
}
