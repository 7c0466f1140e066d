//! Posting service: the entry point for every balance-changing operation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId, SubjectId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::types::{
    BalanceLine, BalanceSummary, BucketView, Decision, DecisionOutcome, NewCredit, NewDebit,
    PostingResult, ReconciliationReport, Violation,
};
use crate::bucket::{Bucket, BucketAllocator, OVERDRAFT_NOTE};
use crate::ledger::{
    BalanceCalculator, EntryQuery, EntryReference, EntryType, LedgerEntry, LedgerError,
    LedgerStore, LedgerTx, LockScope, NewLedgerEntry, ReferenceType, validate_reference_id,
    validate_requested_amount,
};
use crate::policy::{ConsumptionRequest, PolicyEngine, PolicyRegistry};
use crate::reservation::{
    Availability, NewReservation, Reservation, ReservationManager, ReservationStatus,
};

/// Orchestrates policy evaluation, reservations and direct postings.
pub struct PostingService<S, P> {
    reservations: ReservationManager<S>,
    policy_engine: P,
}

impl<S: LedgerStore, P: PolicyEngine> PostingService<S, P> {
    /// Creates a posting service.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        policies: Arc<PolicyRegistry>,
        policy_engine: P,
        reservation_ttl: Duration,
    ) -> Self {
        Self {
            reservations: ReservationManager::new(store, policies, reservation_ttl),
            policy_engine,
        }
    }

    /// The reservation manager used for holds.
    #[must_use]
    pub const fn reservations(&self) -> &ReservationManager<S> {
        &self.reservations
    }

    fn store(&self) -> &S {
        self.reservations.store()
    }

    fn policies(&self) -> &PolicyRegistry {
        self.reservations.policies()
    }

    /// Evaluates a consumption request and places the resulting hold.
    ///
    /// # Errors
    ///
    /// Returns the policy engine's error, or any error of
    /// [`ReservationManager::reserve`].
    pub async fn validate_and_reserve(
        &self,
        request: ConsumptionRequest,
        now: DateTime<Utc>,
    ) -> Result<Reservation, LedgerError> {
        let decision = self.policy_engine.evaluate(&request).await?;
        debug!(
            reference_id = %request.reference_id,
            balance_type = %decision.balance_type,
            amount = %decision.amount,
            allow_negative = decision.allow_negative,
            "Policy evaluated"
        );

        self.reservations
            .reserve(
                NewReservation {
                    subject_id: request.subject_id,
                    balance_type: decision.balance_type,
                    amount: decision.amount,
                    reference_type: request.reference_type,
                    reference_id: request.reference_id,
                    allow_negative: decision.allow_negative,
                    expires_at: request.expires_at,
                    created_by: request.created_by,
                },
                now,
            )
            .await
    }

    /// Applies an approval workflow decision.
    ///
    /// Deliveries may repeat: a repeated approval replays the rows written
    /// the first time and a repeated rejection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ReservationNotFound` for an unknown reference and
    /// `ReservationAlreadyResolved` when approving a released hold.
    pub async fn on_decision(
        &self,
        reference_id: &str,
        decision: Decision,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, LedgerError> {
        info!(reference_id, decision = %decision, "Applying decision");
        match decision {
            Decision::Approved => {
                let entries = self.reservations.confirm(reference_id, now).await?;
                Ok(DecisionOutcome::Confirmed { entries })
            }
            Decision::Rejected | Decision::Cancelled => {
                let reason = reason.or_else(|| Some(decision.as_str().to_lowercase()));
                Ok(self.reservations.cancel(reference_id, reason, now).await?.into())
            }
        }
    }

    /// Posts a credit. A repeated reference returns the existing rows.
    ///
    /// # Errors
    ///
    /// Returns `CreditEntryRequired` for a debit entry type and validation
    /// errors for a non-positive amount or a malformed reference.
    pub async fn post_credit(
        &self,
        credit: NewCredit,
        now: DateTime<Utc>,
    ) -> Result<PostingResult, LedgerError> {
        if !credit.entry_type.is_credit() {
            return Err(LedgerError::CreditEntryRequired(credit.entry_type));
        }
        validate_requested_amount(credit.amount)?;
        validate_reference_id(&credit.reference_id)?;

        let mut tx = self
            .store()
            .begin(LockScope::subject(credit.subject_id, &[credit.balance_type]))
            .await?;

        let existing: Vec<LedgerEntry> = tx
            .get_by_reference(credit.reference_type, &credit.reference_id, Some(credit.entry_type))
            .await?
            .into_iter()
            .filter(|e| e.subject_id == credit.subject_id && e.balance_type == credit.balance_type)
            .collect();
        if !existing.is_empty() {
            tx.rollback().await?;
            debug!(reference_id = %credit.reference_id, "Credit replayed");
            return Ok(PostingResult {
                entries: existing,
                created: false,
            });
        }

        let entry = tx
            .append(NewLedgerEntry {
                subject_id: credit.subject_id,
                period: credit.period,
                balance_type: credit.balance_type,
                entry_type: credit.entry_type,
                amount: credit.amount,
                reference: EntryReference::new(credit.reference_type, credit.reference_id),
                drawn_from: None,
                expires_on: credit.expires_on,
                created_by: credit.created_by,
                created_at: now,
                notes: credit.notes,
            })
            .await?;
        tx.commit().await?;

        info!(
            subject_id = %entry.subject_id,
            balance_type = %entry.balance_type,
            entry_type = %entry.entry_type,
            amount = %entry.amount,
            "Credit posted"
        );
        Ok(PostingResult {
            entries: vec![entry],
            created: true,
        })
    }

    /// Posts an `ADJUSTMENT_SUB` correction through the allocator.
    ///
    /// Pending reservations are not taken into account: a correction reflects
    /// something that already happened.
    ///
    /// # Errors
    ///
    /// Returns validation errors for malformed input and
    /// `InsufficientBalance` when the pool cannot cover the amount without
    /// an override.
    pub async fn post_debit_adjustment(
        &self,
        debit: NewDebit,
        now: DateTime<Utc>,
    ) -> Result<PostingResult, LedgerError> {
        validate_requested_amount(debit.amount)?;
        validate_reference_id(&debit.reference_id)?;

        let pool = self.policies().pool(debit.balance_type);
        let mut tx = self
            .store()
            .begin(LockScope::subject(debit.subject_id, &pool))
            .await?;

        let existing: Vec<LedgerEntry> = tx
            .get_by_reference(
                debit.reference_type,
                &debit.reference_id,
                Some(EntryType::AdjustmentSub),
            )
            .await?
            .into_iter()
            .filter(|e| e.subject_id == debit.subject_id && pool.contains(&e.balance_type))
            .collect();
        if !existing.is_empty() {
            tx.rollback().await?;
            debug!(reference_id = %debit.reference_id, "Debit adjustment replayed");
            return Ok(PostingResult {
                entries: existing,
                created: false,
            });
        }

        let history = tx
            .get_entries(&EntryQuery::subject(debit.subject_id).of_types(&pool))
            .await?;
        let allow_negative =
            debit.allow_negative || self.policies().allows_negative(debit.balance_type);
        let attributions = BucketAllocator::allocate(
            &history,
            self.policies(),
            debit.balance_type,
            debit.amount,
            now,
            allow_negative,
        )?;

        let reference = EntryReference::new(debit.reference_type, debit.reference_id.clone());
        let mut entries = Vec::with_capacity(attributions.len());
        for attribution in &attributions {
            let mut row = attribution.debit_entry(
                debit.subject_id,
                EntryType::AdjustmentSub,
                &reference,
                debit.created_by,
                now,
            );
            if row.notes.is_none() {
                row.notes.clone_from(&debit.notes);
            }
            entries.push(tx.append(row).await?);
        }
        tx.commit().await?;

        info!(
            reference_id = %debit.reference_id,
            subject_id = %debit.subject_id,
            amount = %debit.amount,
            rows = entries.len(),
            "Debit adjustment posted"
        );
        Ok(PostingResult {
            entries,
            created: true,
        })
    }

    /// Per-type balances of a period with pending reservations alongside.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn get_balance_summary(
        &self,
        subject_id: SubjectId,
        period: i32,
    ) -> Result<BalanceSummary, LedgerError> {
        let mut tx = self.store().begin(LockScope::ReadOnly).await?;
        let entries = tx
            .get_entries(&EntryQuery::subject(subject_id).in_period(period))
            .await?;
        let pending = tx
            .pending_reservations(subject_id, &BalanceType::ALL)
            .await?;
        tx.rollback().await?;

        let mut reserved: BTreeMap<BalanceType, Decimal> = BTreeMap::new();
        for reservation in &pending {
            *reserved.entry(reservation.balance_type).or_default() += reservation.amount;
        }

        let mut balances = BalanceCalculator::compute_all_balances(&entries, period);
        for balance_type in reserved.keys() {
            balances.entry(*balance_type).or_default();
        }

        Ok(BalanceSummary {
            subject_id,
            period,
            balances: balances
                .into_iter()
                .map(|(balance_type, b)| BalanceLine {
                    balance_type,
                    credited: b.credited,
                    debited: b.debited,
                    balance: b.balance,
                    reserved: reserved.get(&balance_type).copied().unwrap_or_default(),
                })
                .collect(),
        })
    }

    /// A subject's ledger rows, optionally of one period.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn get_ledger(
        &self,
        subject_id: SubjectId,
        period: Option<i32>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut query = EntryQuery::subject(subject_id);
        if let Some(period) = period {
            query = query.in_period(period);
        }
        let mut tx = self.store().begin(LockScope::ReadOnly).await?;
        let entries = tx.get_entries(&query).await?;
        tx.rollback().await?;
        Ok(entries)
    }

    /// Buckets of the pool `balance_type` belongs to, in consumption order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn get_buckets(
        &self,
        subject_id: SubjectId,
        balance_type: BalanceType,
        as_of: NaiveDate,
    ) -> Result<Vec<BucketView>, LedgerError> {
        let pool = self.policies().pool(balance_type);
        let mut tx = self.store().begin(LockScope::ReadOnly).await?;
        let history = tx
            .get_entries(&EntryQuery::subject(subject_id).of_types(&pool))
            .await?;
        tx.rollback().await?;

        Ok(BucketAllocator::buckets(&history, self.policies())
            .into_iter()
            .map(|bucket| BucketView {
                expired: bucket.is_expired(as_of),
                bucket,
            })
            .collect())
    }

    /// What can still be reserved against `balance_type` on `as_of`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn get_available(
        &self,
        subject_id: SubjectId,
        balance_type: BalanceType,
        as_of: NaiveDate,
    ) -> Result<Availability, LedgerError> {
        self.reservations
            .availability(subject_id, balance_type, as_of)
            .await
    }

    /// Replays a subject's history and reports broken invariants.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the ledger cannot be read.
    pub async fn reconcile(&self, subject_id: SubjectId) -> Result<ReconciliationReport, LedgerError> {
        let mut tx = self.store().begin(LockScope::ReadOnly).await?;
        let entries = tx.get_entries(&EntryQuery::subject(subject_id)).await?;
        let reservations = tx.list_reservations(subject_id, None).await?;
        tx.rollback().await?;

        let mut violations = Vec::new();

        let mut usage: BTreeMap<(ReferenceType, &str), Decimal> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.entry_type == EntryType::Usage) {
            *usage
                .entry((entry.reference.reference_type, entry.reference.reference_id.as_str()))
                .or_default() += entry.amount;
        }

        for reservation in reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Confirmed)
        {
            let posted = usage
                .remove(&(reservation.reference_type, reservation.reference_id.as_str()))
                .unwrap_or_default();
            if posted != reservation.amount {
                violations.push(Violation::UsageMismatch {
                    reference_id: reservation.reference_id.clone(),
                    confirmed: reservation.amount,
                    posted,
                });
            }
        }
        for ((reference_type, reference_id), amount) in usage {
            violations.push(Violation::OrphanUsage {
                reference_type,
                reference_id: reference_id.to_string(),
                amount,
            });
        }

        let credit_ids: HashSet<LedgerEntryId> = entries
            .iter()
            .filter(|e| e.entry_type.is_credit())
            .map(|e| e.id)
            .collect();
        for entry in entries.iter().filter(|e| e.entry_type.is_debit()) {
            if let Some(drawn_from) = entry.drawn_from
                && !credit_ids.contains(&drawn_from)
            {
                violations.push(Violation::DanglingAttribution {
                    entry_id: entry.id,
                    drawn_from,
                });
            }
        }

        let overdrawn: Vec<_> = BucketAllocator::buckets(&entries, self.policies())
            .into_iter()
            .filter(Bucket::is_overdrawn)
            .collect();
        for bucket in &overdrawn {
            let authorized = entries.iter().any(|e| {
                e.drawn_from == Some(bucket.entry_id) && e.notes.as_deref() == Some(OVERDRAFT_NOTE)
            });
            if !authorized {
                violations.push(Violation::UnauthorizedOverdraft {
                    entry_id: bucket.entry_id,
                    remaining: bucket.remaining_amount,
                });
            }
        }

        if violations.is_empty() {
            debug!(subject_id = %subject_id, "Ledger reconciled");
        } else {
            warn!(subject_id = %subject_id, violations = violations.len(), "Ledger inconsistent");
        }

        Ok(ReconciliationReport {
            subject_id,
            entries_checked: entries.len(),
            reservations_checked: reservations.len(),
            overdrawn,
            violations,
        })
    }
}
