//! Reservation domain types.

use chrono::{DateTime, Utc};
use entitle_shared::types::{BalanceType, ReservationId, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::ReferenceType;

/// Reservation status.
///
/// Reservations are created `Pending` and leave it exactly once:
/// - Pending → Confirmed (ledger debit posted)
/// - Pending → Cancelled (no ledger effect)
/// - Pending → Expired (past `expires_at` without a decision)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Hold is open and counts against availability.
    Pending,
    /// Hold was converted into ledger debits.
    Confirmed,
    /// Hold was released.
    Cancelled,
    /// Hold lapsed without a decision.
    Expired,
}

impl ReservationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parses a status from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "CANCELLED" => Some(Self::Cancelled),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Returns true once the reservation can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tentative hold against future balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier.
    pub id: ReservationId,
    /// Whose balance is held.
    pub subject_id: SubjectId,
    /// Balance type requested.
    pub balance_type: BalanceType,
    /// Amount held.
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id (unique across reservations).
    pub reference_id: String,
    /// Current status.
    pub status: ReservationStatus,
    /// Whether confirmation may overdraw.
    pub allow_negative: bool,
    /// Eligibility deadline for expiry.
    pub expires_at: DateTime<Utc>,
    /// Who requested the hold.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Set when cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Set when expired.
    pub expired_at: Option<DateTime<Utc>>,
    /// Reason given on cancellation.
    pub cancel_reason: Option<String>,
}

impl Reservation {
    /// Applies a transition in place. Callers check `status` first.
    pub fn apply(&mut self, transition: &ReservationTransition) {
        self.status = transition.target_status();
        match transition {
            ReservationTransition::Confirm { at } => self.confirmed_at = Some(*at),
            ReservationTransition::Cancel { at, reason } => {
                self.cancelled_at = Some(*at);
                self.cancel_reason.clone_from(reason);
            }
            ReservationTransition::Expire { at } => self.expired_at = Some(*at),
        }
    }
}

/// A move out of `Pending`, carrying its audit data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationTransition {
    /// Pending → Confirmed.
    Confirm {
        /// When the decision was applied.
        at: DateTime<Utc>,
    },
    /// Pending → Cancelled.
    Cancel {
        /// When the hold was released.
        at: DateTime<Utc>,
        /// Optional reason.
        reason: Option<String>,
    },
    /// Pending → Expired.
    Expire {
        /// When the expiry was recorded.
        at: DateTime<Utc>,
    },
}

impl ReservationTransition {
    /// Status the reservation ends up in.
    #[must_use]
    pub const fn target_status(&self) -> ReservationStatus {
        match self {
            Self::Confirm { .. } => ReservationStatus::Confirmed,
            Self::Cancel { .. } => ReservationStatus::Cancelled,
            Self::Expire { .. } => ReservationStatus::Expired,
        }
    }
}

/// Input for creating a reservation.
#[derive(Debug, Clone)]
pub struct NewReservation {
    /// Whose balance is held.
    pub subject_id: SubjectId,
    /// Balance type requested.
    pub balance_type: BalanceType,
    /// Amount to hold (> 0).
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id.
    pub reference_id: String,
    /// Whether the hold may exceed availability.
    pub allow_negative: bool,
    /// Explicit deadline; the manager's TTL applies otherwise.
    pub expires_at: Option<DateTime<Utc>>,
    /// Who requested the hold.
    pub created_by: Option<UserId>,
}

/// Result of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The hold was released by this call.
    Cancelled(Reservation),
    /// The reservation was already terminal; nothing changed.
    Unchanged(Reservation),
}

impl CancelOutcome {
    /// The reservation as it stands after the call.
    #[must_use]
    pub const fn reservation(&self) -> &Reservation {
        match self {
            Self::Cancelled(r) | Self::Unchanged(r) => r,
        }
    }
}

/// How much of a pool can still be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Remaining across live buckets of the pool.
    pub spendable: Decimal,
    /// Held by pending reservations against the pool.
    pub reserved: Decimal,
    /// `spendable - reserved`; negative after an authorized overdraft.
    pub available: Decimal,
}

impl Availability {
    /// Builds the view from its two inputs.
    #[must_use]
    pub fn new(spendable: Decimal, reserved: Decimal) -> Self {
        Self {
            spendable,
            reserved,
            available: spendable - reserved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReservationStatus::parse("approved"), None);
    }

    #[test]
    fn test_only_pending_is_open() {
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(ReservationStatus::Confirmed.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
    }

    #[test]
    fn test_apply_cancel_records_reason() {
        let now = Utc::now();
        let mut reservation = Reservation {
            id: ReservationId::new(),
            subject_id: SubjectId::new(),
            balance_type: BalanceType::Rol,
            amount: dec!(4),
            reference_type: ReferenceType::LeaveRequest,
            reference_id: "LR-1".to_string(),
            status: ReservationStatus::Pending,
            allow_negative: false,
            expires_at: now,
            created_by: None,
            created_at: now,
            confirmed_at: None,
            cancelled_at: None,
            expired_at: None,
            cancel_reason: None,
        };
        reservation.apply(&ReservationTransition::Cancel {
            at: now,
            reason: Some("withdrawn".to_string()),
        });
        assert_eq!(reservation.status, ReservationStatus::Cancelled);
        assert_eq!(reservation.cancelled_at, Some(now));
        assert_eq!(reservation.cancel_reason.as_deref(), Some("withdrawn"));
    }
}
