//! In-process ledger store.
//!
//! Every unit of work holds one store-wide lock and writes to a staged copy
//! of the state; `commit` publishes the copy, anything else discards it.
//! Used by tests and by embedders that do not need durability.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId, SubjectId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::ledger::{
    EntryQuery, EntryType, LedgerEntry, LedgerError, LedgerStore, LedgerTx, LockScope,
    NewLedgerEntry, ReferenceType, validate_new_entry,
};
use crate::reservation::{Reservation, ReservationStatus, ReservationTransition};

#[derive(Debug, Clone, Default)]
struct State {
    entries: Vec<LedgerEntry>,
    reservations: Vec<Reservation>,
}

/// Ledger store kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<State>>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self, _scope: LockScope) -> Result<MemoryLedgerTx, LedgerError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryLedgerTx { guard, staged })
    }
}

/// Unit of work over [`MemoryLedgerStore`].
pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<State>,
    staged: State,
}

fn sorted(mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    entries.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    entries
}

impl LedgerTx for MemoryLedgerTx {
    async fn append(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        validate_new_entry(&entry)?;
        let entry = LedgerEntry::from_new(LedgerEntryId::new(), entry);
        self.staged.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_by_reference(
        &mut self,
        reference_type: ReferenceType,
        reference_id: &str,
        entry_type: Option<EntryType>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(sorted(
            self.staged
                .entries
                .iter()
                .filter(|e| {
                    e.reference.reference_type == reference_type
                        && e.reference.reference_id == reference_id
                        && entry_type.is_none_or(|t| e.entry_type == t)
                })
                .cloned()
                .collect(),
        ))
    }

    async fn get_entries(&mut self, query: &EntryQuery) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(sorted(
            self.staged
                .entries
                .iter()
                .filter(|e| query.matches(e.subject_id, e.period, e.balance_type))
                .cloned()
                .collect(),
        ))
    }

    async fn subjects_with_entries(
        &mut self,
        balance_types: &[BalanceType],
    ) -> Result<Vec<SubjectId>, LedgerError> {
        let mut subjects: Vec<SubjectId> = self
            .staged
            .entries
            .iter()
            .filter(|e| balance_types.is_empty() || balance_types.contains(&e.balance_type))
            .map(|e| e.subject_id)
            .collect();
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    async fn find_reservation(
        &mut self,
        reference_id: &str,
    ) -> Result<Option<Reservation>, LedgerError> {
        Ok(self
            .staged
            .reservations
            .iter()
            .find(|r| r.reference_id == reference_id)
            .cloned())
    }

    async fn insert_reservation(
        &mut self,
        reservation: Reservation,
    ) -> Result<Reservation, LedgerError> {
        if self
            .staged
            .reservations
            .iter()
            .any(|r| r.reference_id == reservation.reference_id)
        {
            return Err(LedgerError::DuplicateReservation(reservation.reference_id));
        }
        self.staged.reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn transition_reservation(
        &mut self,
        reference_id: &str,
        transition: ReservationTransition,
    ) -> Result<bool, LedgerError> {
        let Some(reservation) = self
            .staged
            .reservations
            .iter_mut()
            .find(|r| r.reference_id == reference_id && r.status == ReservationStatus::Pending)
        else {
            return Ok(false);
        };
        reservation.apply(&transition);
        Ok(true)
    }

    async fn list_reservations(
        &mut self,
        subject_id: SubjectId,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let mut reservations: Vec<Reservation> = self
            .staged
            .reservations
            .iter()
            .filter(|r| r.subject_id == subject_id && status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn pending_reservations(
        &mut self,
        subject_id: SubjectId,
        balance_types: &[BalanceType],
    ) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self
            .staged
            .reservations
            .iter()
            .filter(|r| {
                r.subject_id == subject_id
                    && r.status == ReservationStatus::Pending
                    && balance_types.contains(&r.balance_type)
            })
            .cloned()
            .collect())
    }

    async fn stale_reservations(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self
            .staged
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending && r.expires_at < now)
            .cloned()
            .collect())
    }

    async fn commit(mut self) -> Result<(), LedgerError> {
        *self.guard = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        Ok(())
    }
}
