//! Posting inputs, outcomes and read models.

use chrono::NaiveDate;
use entitle_shared::types::{BalanceType, LedgerEntryId, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bucket::Bucket;
use crate::ledger::{EntryType, LedgerEntry, ReferenceType};
use crate::reservation::{CancelOutcome, Reservation};

/// Approval workflow outcome for a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Approved: the hold becomes ledger debits.
    Approved,
    /// Rejected by an approver: the hold is released.
    Rejected,
    /// Withdrawn by the requester: the hold is released.
    Cancelled,
}

impl Decision {
    /// Returns the string representation of the decision.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What applying a decision did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// USAGE rows written (or replayed) for the reservation.
    Confirmed {
        /// The debit rows.
        entries: Vec<LedgerEntry>,
    },
    /// The hold was released, or was already terminal.
    Released {
        /// Reservation after the call.
        reservation: Reservation,
        /// Whether this call changed it.
        changed: bool,
    },
}

impl From<CancelOutcome> for DecisionOutcome {
    fn from(outcome: CancelOutcome) -> Self {
        match outcome {
            CancelOutcome::Cancelled(reservation) => Self::Released {
                reservation,
                changed: true,
            },
            CancelOutcome::Unchanged(reservation) => Self::Released {
                reservation,
                changed: false,
            },
        }
    }
}

/// A credit posted directly by an accrual run or an HR correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCredit {
    /// Beneficiary.
    pub subject_id: SubjectId,
    /// Accounting period the credit belongs to.
    pub period: i32,
    /// Balance type credited.
    pub balance_type: BalanceType,
    /// ACCRUAL, `ADJUSTMENT_ADD` or `CARRY_OVER`.
    pub entry_type: EntryType,
    /// Amount credited (> 0).
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id.
    pub reference_id: String,
    /// Explicit last valid day, overriding the type's expiry rule.
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
    /// Who posted it.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Free text.
    #[serde(default)]
    pub notes: Option<String>,
}

/// A manual debit correction, drawn through the allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDebit {
    /// Whose balance is corrected.
    pub subject_id: SubjectId,
    /// Balance type debited.
    pub balance_type: BalanceType,
    /// Amount debited (> 0).
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id.
    pub reference_id: String,
    /// Whether the correction may overdraw.
    #[serde(default)]
    pub allow_negative: bool,
    /// Who posted it.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Free text.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Rows written by a direct posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostingResult {
    /// The rows for the reference.
    pub entries: Vec<LedgerEntry>,
    /// False when the rows already existed and nothing was written.
    pub created: bool,
}

/// One balance type's position within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceLine {
    /// Balance type.
    pub balance_type: BalanceType,
    /// Sum of credits.
    pub credited: Decimal,
    /// Sum of debits.
    pub debited: Decimal,
    /// `credited - debited`.
    pub balance: Decimal,
    /// Pending reservations of this type.
    pub reserved: Decimal,
}

/// Balances of a subject for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    /// Subject.
    pub subject_id: SubjectId,
    /// Period.
    pub period: i32,
    /// Types with entries in the period or pending reservations, in type order.
    pub balances: Vec<BalanceLine>,
}

/// A bucket as seen on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketView {
    /// The bucket.
    #[serde(flatten)]
    pub bucket: Bucket,
    /// Whether the bucket is past its last valid day.
    pub expired: bool,
}

/// A broken ledger invariant found by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Confirmed reservation whose USAGE rows do not add up to its amount.
    UsageMismatch {
        /// Reservation reference.
        reference_id: String,
        /// Reservation amount.
        confirmed: Decimal,
        /// Sum of USAGE rows for the reference.
        posted: Decimal,
    },
    /// USAGE rows with no confirmed reservation behind them.
    OrphanUsage {
        /// Kind of business event.
        reference_type: ReferenceType,
        /// Business event id.
        reference_id: String,
        /// Sum of the rows.
        amount: Decimal,
    },
    /// Debit pointing at a bucket that does not exist.
    DanglingAttribution {
        /// The debit.
        entry_id: LedgerEntryId,
        /// The missing bucket.
        drawn_from: LedgerEntryId,
    },
    /// Bucket drawn below zero with no overdraft row.
    UnauthorizedOverdraft {
        /// The bucket's credit entry.
        entry_id: LedgerEntryId,
        /// Its remaining amount.
        remaining: Decimal,
    },
}

/// Outcome of replaying a subject's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Subject checked.
    pub subject_id: SubjectId,
    /// Entries replayed.
    pub entries_checked: usize,
    /// Reservations checked.
    pub reservations_checked: usize,
    /// Buckets below zero, authorized or not.
    pub overdrawn: Vec<Bucket>,
    /// Invariant violations.
    pub violations: Vec<Violation>,
}

impl ReconciliationReport {
    /// Returns true if no violation was found.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}
