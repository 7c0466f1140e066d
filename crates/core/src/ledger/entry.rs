//! Ledger entry domain types.

use chrono::{DateTime, NaiveDate, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::EntryReference;

/// Type of ledger entry.
///
/// The sign of an entry is implied by its type; amounts are always stored
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Periodic accrual of entitlement.
    Accrual,
    /// Manual increase by HR.
    AdjustmentAdd,
    /// Residual entitlement carried into a new period.
    CarryOver,
    /// Consumption through an approved request.
    Usage,
    /// Manual decrease by HR.
    AdjustmentSub,
    /// Write-off of an expired remainder.
    Expired,
}

impl EntryType {
    /// Every entry type, credits first.
    pub const ALL: [Self; 6] = [
        Self::Accrual,
        Self::AdjustmentAdd,
        Self::CarryOver,
        Self::Usage,
        Self::AdjustmentSub,
        Self::Expired,
    ];

    /// Returns true if entries of this type increase the balance.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Accrual | Self::AdjustmentAdd | Self::CarryOver)
    }

    /// Returns true if entries of this type decrease the balance.
    #[must_use]
    pub const fn is_debit(self) -> bool {
        !self.is_credit()
    }

    /// Returns the string representation of the entry type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accrual => "ACCRUAL",
            Self::AdjustmentAdd => "ADJUSTMENT_ADD",
            Self::CarryOver => "CARRY_OVER",
            Self::Usage => "USAGE",
            Self::AdjustmentSub => "ADJUSTMENT_SUB",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parses an entry type from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACCRUAL" => Some(Self::Accrual),
            "ADJUSTMENT_ADD" => Some(Self::AdjustmentAdd),
            "CARRY_OVER" => Some(Self::CarryOver),
            "USAGE" => Some(Self::Usage),
            "ADJUSTMENT_SUB" => Some(Self::AdjustmentSub),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry to be appended to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    /// Whose balance the entry affects.
    pub subject_id: SubjectId,
    /// Fiscal year the entry belongs to.
    pub period: i32,
    /// Balance the entry affects.
    pub balance_type: BalanceType,
    /// Credit or debit kind.
    pub entry_type: EntryType,
    /// Non-negative magnitude.
    pub amount: Decimal,
    /// Business event that caused the entry.
    pub reference: EntryReference,
    /// For debits: the credit entry the amount was drawn from.
    pub drawn_from: Option<LedgerEntryId>,
    /// For credits: explicit last valid day, overriding the type's expiry rule.
    pub expires_on: Option<NaiveDate>,
    /// Who caused the entry (None for system jobs).
    pub created_by: Option<UserId>,
    /// Effective timestamp; orders entries within a bucket walk.
    pub created_at: DateTime<Utc>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// A persisted, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier for this entry.
    pub id: LedgerEntryId,
    /// Whose balance the entry affects.
    pub subject_id: SubjectId,
    /// Fiscal year the entry belongs to.
    pub period: i32,
    /// Balance the entry affects.
    pub balance_type: BalanceType,
    /// Credit or debit kind.
    pub entry_type: EntryType,
    /// Non-negative magnitude.
    pub amount: Decimal,
    /// Business event that caused the entry.
    pub reference: EntryReference,
    /// For debits: the credit entry the amount was drawn from.
    pub drawn_from: Option<LedgerEntryId>,
    /// For credits: explicit last valid day.
    pub expires_on: Option<NaiveDate>,
    /// Who caused the entry.
    pub created_by: Option<UserId>,
    /// Effective timestamp.
    pub created_at: DateTime<Utc>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl LedgerEntry {
    /// Materializes a new entry under the given id.
    #[must_use]
    pub fn from_new(id: LedgerEntryId, entry: NewLedgerEntry) -> Self {
        Self {
            id,
            subject_id: entry.subject_id,
            period: entry.period,
            balance_type: entry.balance_type,
            entry_type: entry.entry_type,
            amount: entry.amount,
            reference: entry.reference,
            drawn_from: entry.drawn_from,
            expires_on: entry.expires_on,
            created_by: entry.created_by,
            created_at: entry.created_at,
            notes: entry.notes,
        }
    }

    /// Returns the signed amount (positive for credits, negative for debits).
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        if self.entry_type.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
