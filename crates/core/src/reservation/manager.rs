//! Reservation manager.
//!
//! Holds are checked and written under the subject's pool lock so that two
//! requests against the same pool never both see the same availability.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use entitle_shared::types::{BalanceType, ReservationId, SubjectId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::lifecycle::{LifecycleStep, ReservationLifecycle};
use super::types::{Availability, CancelOutcome, NewReservation, Reservation, ReservationStatus};
use crate::bucket::BucketAllocator;
use crate::ledger::{
    EntryQuery, EntryReference, EntryType, LedgerEntry, LedgerError, LedgerStore, LedgerTx,
    LockScope, validate_reference_id, validate_requested_amount,
};
use crate::policy::PolicyRegistry;

/// Status written on USAGE rows posted by a confirmation.
pub const APPROVED_STATUS: &str = "APPROVED";

/// Creates, confirms, cancels and expires reservations.
pub struct ReservationManager<S> {
    store: Arc<S>,
    policies: Arc<PolicyRegistry>,
    ttl: Duration,
}

impl<S: LedgerStore> ReservationManager<S> {
    /// Creates a manager. `ttl` is the default lifetime of a hold.
    #[must_use]
    pub const fn new(store: Arc<S>, policies: Arc<PolicyRegistry>, ttl: Duration) -> Self {
        Self {
            store,
            policies,
            ttl,
        }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Balance type policies in force.
    #[must_use]
    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    /// Places a hold.
    ///
    /// A repeated request for the same reference returns the stored
    /// reservation when its terms match.
    ///
    /// # Errors
    ///
    /// - `NonPositiveAmount` / `InvalidReference` for malformed input
    /// - `ReservationMismatch` when the reference is already held with other terms
    /// - `InsufficientBalance` when the pool cannot cover the hold and no
    ///   override applies
    pub async fn reserve(
        &self,
        request: NewReservation,
        now: DateTime<Utc>,
    ) -> Result<Reservation, LedgerError> {
        validate_requested_amount(request.amount)?;
        validate_reference_id(&request.reference_id)?;

        let pool = self.policies.pool(request.balance_type);
        let mut tx = self
            .store
            .begin(LockScope::subject(request.subject_id, &pool))
            .await?;

        if let Some(existing) = tx.find_reservation(&request.reference_id).await? {
            ReservationLifecycle::check_replay(&existing, &request)?;
            tx.rollback().await?;
            debug!(reference_id = %existing.reference_id, "Reservation replayed");
            return Ok(existing);
        }

        let availability =
            pool_availability(&mut tx, &self.policies, request.subject_id, &pool, now.date_naive())
                .await?;
        let allow_negative =
            request.allow_negative || self.policies.allows_negative(request.balance_type);
        if request.amount > availability.available && !allow_negative {
            return Err(LedgerError::InsufficientBalance {
                balance_type: request.balance_type,
                requested: request.amount,
                available: availability.available.max(Decimal::ZERO),
            });
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            subject_id: request.subject_id,
            balance_type: request.balance_type,
            amount: request.amount,
            reference_type: request.reference_type,
            reference_id: request.reference_id,
            status: ReservationStatus::Pending,
            allow_negative,
            expires_at: request.expires_at.unwrap_or(now + self.ttl),
            created_by: request.created_by,
            created_at: now,
            confirmed_at: None,
            cancelled_at: None,
            expired_at: None,
            cancel_reason: None,
        };
        let reservation = tx.insert_reservation(reservation).await?;
        tx.commit().await?;

        info!(
            reference_id = %reservation.reference_id,
            subject_id = %reservation.subject_id,
            balance_type = %reservation.balance_type,
            amount = %reservation.amount,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Sum of pending holds of one balance type.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the reservations cannot be read.
    pub async fn open_reservations(
        &self,
        subject_id: SubjectId,
        balance_type: BalanceType,
    ) -> Result<Decimal, LedgerError> {
        let mut tx = self.store.begin(LockScope::ReadOnly).await?;
        let pending = tx.pending_reservations(subject_id, &[balance_type]).await?;
        tx.rollback().await?;
        Ok(pending.iter().map(|r| r.amount).sum())
    }

    /// Spendable, reserved and available amounts of the pool `balance_type` belongs to.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn availability(
        &self,
        subject_id: SubjectId,
        balance_type: BalanceType,
        as_of: NaiveDate,
    ) -> Result<Availability, LedgerError> {
        let pool = self.policies.pool(balance_type);
        let mut tx = self.store.begin(LockScope::ReadOnly).await?;
        let availability = pool_availability(&mut tx, &self.policies, subject_id, &pool, as_of).await?;
        tx.rollback().await?;
        Ok(availability)
    }

    /// Looks a reservation up by its business reference.
    ///
    /// # Errors
    ///
    /// Returns `ReservationNotFound` if no reservation carries the reference.
    pub async fn get(&self, reference_id: &str) -> Result<Reservation, LedgerError> {
        let mut tx = self.store.begin(LockScope::ReadOnly).await?;
        let found = tx.find_reservation(reference_id).await?;
        tx.rollback().await?;
        found.ok_or_else(|| LedgerError::ReservationNotFound(reference_id.to_string()))
    }

    /// Converts a hold into USAGE debits.
    ///
    /// The transition and the debits are written in one unit of work. A
    /// reservation that is already confirmed returns the rows written the
    /// first time.
    ///
    /// # Errors
    ///
    /// - `ReservationNotFound` for an unknown reference
    /// - `ReservationAlreadyResolved` if the hold was cancelled or expired
    /// - `InsufficientBalance` if the pool shrank below the hold and the
    ///   reservation carries no override; the hold stays pending
    /// - `ConcurrentModification` if another writer resolved it first
    pub async fn confirm(
        &self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let located = self.get(reference_id).await?;
        let pool = self.policies.pool(located.balance_type);
        let mut tx = self
            .store
            .begin(LockScope::subject(located.subject_id, &pool))
            .await?;

        let reservation = tx
            .find_reservation(reference_id)
            .await?
            .ok_or_else(|| LedgerError::ReservationNotFound(reference_id.to_string()))?;

        let transition = match ReservationLifecycle::confirm(&reservation, now)? {
            LifecycleStep::Apply(transition) => transition,
            LifecycleStep::AlreadyApplied | LifecycleStep::NoOp => {
                let posted = tx
                    .get_by_reference(
                        reservation.reference_type,
                        reference_id,
                        Some(EntryType::Usage),
                    )
                    .await?;
                tx.rollback().await?;
                debug!(reference_id, rows = posted.len(), "Confirmation replayed");
                return Ok(posted);
            }
        };

        let posted = tx
            .get_by_reference(reservation.reference_type, reference_id, Some(EntryType::Usage))
            .await?;

        if !tx.transition_reservation(reference_id, transition).await? {
            return Err(LedgerError::ConcurrentModification);
        }

        if !posted.is_empty() {
            warn!(reference_id, "Pending reservation already had usage rows");
            tx.commit().await?;
            return Ok(posted);
        }

        let history = tx
            .get_entries(&EntryQuery::subject(reservation.subject_id).of_types(&pool))
            .await?;
        let attributions = BucketAllocator::allocate(
            &history,
            &self.policies,
            reservation.balance_type,
            reservation.amount,
            now,
            reservation.allow_negative,
        )?;

        let reference = EntryReference::new(reservation.reference_type, reference_id)
            .with_status(APPROVED_STATUS);
        let mut entries = Vec::with_capacity(attributions.len());
        for attribution in &attributions {
            let entry = tx
                .append(attribution.debit_entry(
                    reservation.subject_id,
                    EntryType::Usage,
                    &reference,
                    reservation.created_by,
                    now,
                ))
                .await?;
            entries.push(entry);
        }
        tx.commit().await?;

        info!(
            reference_id,
            subject_id = %reservation.subject_id,
            amount = %reservation.amount,
            rows = entries.len(),
            "Reservation confirmed"
        );
        Ok(entries)
    }

    /// Releases a hold. Terminal reservations are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ReservationNotFound` for an unknown reference and
    /// `ConcurrentModification` if another writer resolved it first.
    pub async fn cancel(
        &self,
        reference_id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, LedgerError> {
        let located = self.get(reference_id).await?;
        let pool = self.policies.pool(located.balance_type);
        let mut tx = self
            .store
            .begin(LockScope::subject(located.subject_id, &pool))
            .await?;

        let mut reservation = tx
            .find_reservation(reference_id)
            .await?
            .ok_or_else(|| LedgerError::ReservationNotFound(reference_id.to_string()))?;

        match ReservationLifecycle::cancel(&reservation, now, reason) {
            LifecycleStep::Apply(transition) => {
                if !tx.transition_reservation(reference_id, transition.clone()).await? {
                    return Err(LedgerError::ConcurrentModification);
                }
                tx.commit().await?;
                reservation.apply(&transition);
                info!(reference_id, "Reservation cancelled");
                Ok(CancelOutcome::Cancelled(reservation))
            }
            LifecycleStep::AlreadyApplied | LifecycleStep::NoOp => {
                tx.rollback().await?;
                debug!(reference_id, status = %reservation.status, "Cancel ignored");
                Ok(CancelOutcome::Unchanged(reservation))
            }
        }
    }

    /// Expires every pending hold past its deadline.
    ///
    /// Each reservation is transitioned in its own unit of work; one that was
    /// resolved in the meantime is skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the stale reservations cannot be listed or
    /// a transition cannot be written.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, LedgerError> {
        let mut tx = self.store.begin(LockScope::ReadOnly).await?;
        let stale = tx.stale_reservations(now).await?;
        tx.rollback().await?;

        let mut expired = Vec::new();
        for candidate in stale {
            let pool = self.policies.pool(candidate.balance_type);
            let mut tx = self
                .store
                .begin(LockScope::subject(candidate.subject_id, &pool))
                .await?;

            let Some(mut reservation) = tx.find_reservation(&candidate.reference_id).await? else {
                tx.rollback().await?;
                continue;
            };
            let LifecycleStep::Apply(transition) = ReservationLifecycle::expire(&reservation, now)
            else {
                tx.rollback().await?;
                continue;
            };
            if tx
                .transition_reservation(&reservation.reference_id, transition.clone())
                .await?
            {
                tx.commit().await?;
                reservation.apply(&transition);
                expired.push(reservation);
            } else {
                tx.rollback().await?;
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Stale reservations expired");
        }
        Ok(expired)
    }

    /// A subject's reservations, optionally of one status.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the reservations cannot be read.
    pub async fn list(
        &self,
        subject_id: SubjectId,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut tx = self.store.begin(LockScope::ReadOnly).await?;
        let reservations = tx.list_reservations(subject_id, status).await?;
        tx.rollback().await?;
        Ok(reservations)
    }
}

/// Availability of a pool inside an open unit of work.
pub(crate) async fn pool_availability<T: LedgerTx>(
    tx: &mut T,
    policies: &PolicyRegistry,
    subject_id: SubjectId,
    pool: &[BalanceType],
    as_of: NaiveDate,
) -> Result<Availability, LedgerError> {
    let history = tx
        .get_entries(&EntryQuery::subject(subject_id).of_types(pool))
        .await?;
    let spendable = BucketAllocator::spendable(&history, policies, as_of);
    let reserved: Decimal = tx
        .pending_reservations(subject_id, pool)
        .await?
        .iter()
        .map(|r| r.amount)
        .sum();
    Ok(Availability::new(spendable, reserved))
}
