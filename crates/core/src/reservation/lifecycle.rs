//! Reservation state machine.
//!
//! Pure transition rules; the manager applies them under a subject lock and
//! persists them with a conditional update.

use chrono::{DateTime, Utc};

use super::types::{NewReservation, Reservation, ReservationStatus, ReservationTransition};
use crate::ledger::LedgerError;

/// What applying a request to a reservation amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStep {
    /// Perform this transition.
    Apply(ReservationTransition),
    /// The requested transition already happened; replay its result.
    AlreadyApplied,
    /// Nothing to do.
    NoOp,
}

/// Stateless reservation transition rules.
pub struct ReservationLifecycle;

impl ReservationLifecycle {
    /// Confirm a reservation.
    ///
    /// # Returns
    /// * `Apply(Confirm)` for a pending reservation
    /// * `AlreadyApplied` for a confirmed one
    ///
    /// # Errors
    ///
    /// Returns `ReservationAlreadyResolved` if the reservation was cancelled
    /// or expired: confirming after release is a conflict.
    pub fn confirm(
        reservation: &Reservation,
        at: DateTime<Utc>,
    ) -> Result<LifecycleStep, LedgerError> {
        match reservation.status {
            ReservationStatus::Pending => {
                Ok(LifecycleStep::Apply(ReservationTransition::Confirm { at }))
            }
            ReservationStatus::Confirmed => Ok(LifecycleStep::AlreadyApplied),
            ReservationStatus::Cancelled | ReservationStatus::Expired => {
                Err(LedgerError::ReservationAlreadyResolved {
                    reference_id: reservation.reference_id.clone(),
                    status: reservation.status,
                })
            }
        }
    }

    /// Cancel a reservation. Terminal reservations are left untouched.
    #[must_use]
    pub fn cancel(
        reservation: &Reservation,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> LifecycleStep {
        match reservation.status {
            ReservationStatus::Pending => {
                LifecycleStep::Apply(ReservationTransition::Cancel { at, reason })
            }
            ReservationStatus::Cancelled => LifecycleStep::AlreadyApplied,
            ReservationStatus::Confirmed | ReservationStatus::Expired => LifecycleStep::NoOp,
        }
    }

    /// Expire a reservation if it is pending and past its deadline.
    #[must_use]
    pub fn expire(reservation: &Reservation, now: DateTime<Utc>) -> LifecycleStep {
        if reservation.status == ReservationStatus::Pending && reservation.expires_at < now {
            LifecycleStep::Apply(ReservationTransition::Expire { at: now })
        } else {
            LifecycleStep::NoOp
        }
    }

    /// Checks that a repeated reserve request matches the stored reservation.
    ///
    /// # Errors
    ///
    /// Returns `ReservationMismatch` if subject, balance type or amount differ.
    pub fn check_replay(existing: &Reservation, request: &NewReservation) -> Result<(), LedgerError> {
        if existing.subject_id == request.subject_id
            && existing.balance_type == request.balance_type
            && existing.amount == request.amount
        {
            Ok(())
        } else {
            Err(LedgerError::ReservationMismatch {
                reference_id: existing.reference_id.clone(),
                existing: existing.amount,
                requested: request.amount,
            })
        }
    }
}
