//! Storage seam for the ledger and its reservations.
//!
//! The db crate implements these traits over Postgres; [`crate::memory`]
//! implements them in process. Entries can only be appended: there is no
//! update or delete on the ledger, and reservations only move out of
//! `PENDING` through a conditional transition.

use std::future::Future;

use chrono::{DateTime, Utc};
use entitle_shared::types::{BalanceType, SubjectId};

use super::entry::{EntryType, LedgerEntry, NewLedgerEntry};
use super::error::LedgerError;
use super::types::{EntryQuery, ReferenceType};
use crate::reservation::{Reservation, ReservationStatus, ReservationTransition};

/// What a unit of work serializes against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockScope {
    /// Plain reads; no writer is excluded.
    ReadOnly,
    /// Exclusive access to one subject's balances of the given types.
    Subject {
        /// Subject being written.
        subject_id: SubjectId,
        /// Balance types locked, sorted by name and deduplicated.
        balance_types: Vec<BalanceType>,
    },
}

impl LockScope {
    /// Builds a subject scope with a deterministic lock order.
    ///
    /// Keys are ordered by their stored name, the same byte order Postgres
    /// uses under the "C" collation.
    #[must_use]
    pub fn subject(subject_id: SubjectId, balance_types: &[BalanceType]) -> Self {
        let mut balance_types = balance_types.to_vec();
        balance_types.sort_by_key(BalanceType::as_str);
        balance_types.dedup();
        Self::Subject {
            subject_id,
            balance_types,
        }
    }

    /// Lock keys in acquisition order.
    #[must_use]
    pub fn lock_keys(&self) -> Vec<(SubjectId, BalanceType)> {
        match self {
            Self::ReadOnly => Vec::new(),
            Self::Subject {
                subject_id,
                balance_types,
            } => balance_types.iter().map(|bt| (*subject_id, *bt)).collect(),
        }
    }
}

/// Factory for units of work over the ledger.
pub trait LedgerStore: Send + Sync {
    /// Transaction handle type.
    type Tx: LedgerTx;

    /// Opens a unit of work, acquiring the locks `scope` names.
    fn begin(
        &self,
        scope: LockScope,
    ) -> impl Future<Output = Result<Self::Tx, LedgerError>> + Send;
}

/// A unit of work. Dropping it without `commit` discards every write.
pub trait LedgerTx: Send {
    /// Appends an entry. Fails with a validation error if `amount < 0`.
    fn append(
        &mut self,
        entry: NewLedgerEntry,
    ) -> impl Future<Output = Result<LedgerEntry, LedgerError>> + Send;

    /// Entries written for a business event, optionally of one type.
    fn get_by_reference(
        &mut self,
        reference_type: ReferenceType,
        reference_id: &str,
        entry_type: Option<EntryType>,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, LedgerError>> + Send;

    /// Entries matching `query`, ordered by `created_at` then id.
    fn get_entries(
        &mut self,
        query: &EntryQuery,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, LedgerError>> + Send;

    /// Subjects having at least one entry of the given types (empty = any type).
    fn subjects_with_entries(
        &mut self,
        balance_types: &[BalanceType],
    ) -> impl Future<Output = Result<Vec<SubjectId>, LedgerError>> + Send;

    /// Reservation for a business event, if any.
    fn find_reservation(
        &mut self,
        reference_id: &str,
    ) -> impl Future<Output = Result<Option<Reservation>, LedgerError>> + Send;

    /// Persists a new reservation. A second reservation for the same
    /// reference fails with `DuplicateReservation`.
    fn insert_reservation(
        &mut self,
        reservation: Reservation,
    ) -> impl Future<Output = Result<Reservation, LedgerError>> + Send;

    /// Moves a reservation out of `PENDING`.
    ///
    /// Returns `false` without writing when the reservation is no longer
    /// pending, so two racing transitions never both apply.
    fn transition_reservation(
        &mut self,
        reference_id: &str,
        transition: ReservationTransition,
    ) -> impl Future<Output = Result<bool, LedgerError>> + Send;

    /// A subject's reservations, optionally filtered by status, oldest first.
    fn list_reservations(
        &mut self,
        subject_id: SubjectId,
        status: Option<ReservationStatus>,
    ) -> impl Future<Output = Result<Vec<Reservation>, LedgerError>> + Send;

    /// Pending reservations of a subject against any of the given types.
    fn pending_reservations(
        &mut self,
        subject_id: SubjectId,
        balance_types: &[BalanceType],
    ) -> impl Future<Output = Result<Vec<Reservation>, LedgerError>> + Send;

    /// Pending reservations whose `expires_at` is before `now`.
    fn stale_reservations(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Reservation>, LedgerError>> + Send;

    /// Makes every write visible and releases locks.
    fn commit(self) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Discards every write and releases locks.
    fn rollback(self) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_scope_is_sorted_and_deduplicated() {
        let subject = SubjectId::new();
        let scope = LockScope::subject(
            subject,
            &[
                BalanceType::VacationAc,
                BalanceType::VacationAp,
                BalanceType::VacationAc,
            ],
        );
        assert_eq!(
            scope.lock_keys(),
            vec![
                (subject, BalanceType::VacationAc),
                (subject, BalanceType::VacationAp),
            ]
        );
    }

    #[test]
    fn test_lock_order_follows_stored_names() {
        let scope = LockScope::subject(SubjectId::new(), &BalanceType::ALL);
        let names: Vec<&str> = scope
            .lock_keys()
            .into_iter()
            .map(|(_, bt)| bt.as_str())
            .collect();
        let mut expected = names.clone();
        expected.sort_unstable();
        assert_eq!(names, expected);
        assert_eq!(names.len(), BalanceType::ALL.len());
    }

    #[test]
    fn test_read_only_scope_has_no_locks() {
        assert!(LockScope::ReadOnly.lock_keys().is_empty());
    }
}
