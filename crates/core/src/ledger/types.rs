//! Domain types shared by ledger reads and writes.

use entitle_shared::types::{BalanceType, SubjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of business event an entry points back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// Leave request (vacation, ROL, permits).
    LeaveRequest,
    /// Expense report against a trip budget.
    ExpenseReport,
    /// Cash advance for a trip.
    TripAdvance,
    /// Manual correction by HR.
    ManualAdjustment,
    /// Periodic accrual job run.
    AccrualRun,
    /// Expiration sweep run.
    ExpirationJob,
}

impl ReferenceType {
    /// Returns the string representation of the reference type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LeaveRequest => "LEAVE_REQUEST",
            Self::ExpenseReport => "EXPENSE_REPORT",
            Self::TripAdvance => "TRIP_ADVANCE",
            Self::ManualAdjustment => "MANUAL_ADJUSTMENT",
            Self::AccrualRun => "ACCRUAL_RUN",
            Self::ExpirationJob => "EXPIRATION_JOB",
        }
    }

    /// Parses a reference type from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LEAVE_REQUEST" => Some(Self::LeaveRequest),
            "EXPENSE_REPORT" => Some(Self::ExpenseReport),
            "TRIP_ADVANCE" => Some(Self::TripAdvance),
            "MANUAL_ADJUSTMENT" => Some(Self::ManualAdjustment),
            "ACCRUAL_RUN" => Some(Self::AccrualRun),
            "EXPIRATION_JOB" => Some(Self::ExpirationJob),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable pointer from an entry to the event that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryReference {
    /// Kind of event.
    pub reference_type: ReferenceType,
    /// Identifier of the event in its owning system.
    pub reference_id: String,
    /// Status of the event when the entry was written (e.g. `APPROVED`).
    pub status: Option<String>,
}

impl EntryReference {
    /// Creates a reference without a status.
    pub fn new(reference_type: ReferenceType, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type,
            reference_id: reference_id.into(),
            status: None,
        }
    }

    /// Attaches the event status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// Filter for reading a subject's entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    /// Subject whose entries are read.
    pub subject_id: SubjectId,
    /// Restrict to one fiscal year.
    pub period: Option<i32>,
    /// Restrict to these balance types (empty = all).
    pub balance_types: Vec<BalanceType>,
}

impl EntryQuery {
    /// All entries of a subject.
    #[must_use]
    pub const fn subject(subject_id: SubjectId) -> Self {
        Self {
            subject_id,
            period: None,
            balance_types: Vec::new(),
        }
    }

    /// Restricts the query to one period.
    #[must_use]
    pub const fn in_period(mut self, period: i32) -> Self {
        self.period = Some(period);
        self
    }

    /// Restricts the query to the given balance types.
    #[must_use]
    pub fn of_types(mut self, balance_types: &[BalanceType]) -> Self {
        self.balance_types = balance_types.to_vec();
        self
    }

    /// Returns true if an entry with these coordinates matches the query.
    #[must_use]
    pub fn matches(&self, subject_id: SubjectId, period: i32, balance_type: BalanceType) -> bool {
        self.subject_id == subject_id
            && self.period.is_none_or(|p| p == period)
            && (self.balance_types.is_empty() || self.balance_types.contains(&balance_type))
    }
}
