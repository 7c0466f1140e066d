//! Expiration sweep.
//!
//! Writes off the unused remainder of every bucket past its last valid day
//! with one EXPIRED debit drawn from the bucket. Each subject is swept in its
//! own unit of work; a failing subject is reported and skipped.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId, SubjectId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::bucket::BucketAllocator;
use crate::ledger::{
    EntryQuery, EntryReference, EntryType, LedgerEntry, LedgerError, LedgerStore, LedgerTx,
    LockScope, NewLedgerEntry, ReferenceType, validate_reference_id,
};
use crate::policy::PolicyRegistry;

/// A subject the sweep could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    /// Subject skipped.
    pub subject_id: SubjectId,
    /// Why.
    pub error: String,
}

/// Result of one sweep run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Reference id of the EXPIRED rows.
    pub run_id: String,
    /// Buckets with a last valid day before this date were written off.
    pub as_of: NaiveDate,
    /// Subjects visited.
    pub subjects_scanned: usize,
    /// Rows written by this run.
    pub entries: Vec<LedgerEntry>,
    /// Subjects that failed.
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    /// Total amount written off.
    #[must_use]
    pub fn expired_amount(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

/// Run id used when none is supplied: one per sweep date.
#[must_use]
pub fn default_run_id(as_of: NaiveDate) -> String {
    format!("expiration-{}", as_of.format("%Y-%m-%d"))
}

/// Periodic write-off of expired bucket remainders.
pub struct ExpirationSweep<S> {
    store: Arc<S>,
    policies: Arc<PolicyRegistry>,
}

impl<S: LedgerStore> ExpirationSweep<S> {
    /// Creates a sweep over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, policies: Arc<PolicyRegistry>) -> Self {
        Self { store, policies }
    }

    /// Sweeps every subject.
    ///
    /// Re-running with the same run id writes nothing new.
    ///
    /// # Errors
    ///
    /// Returns an error only if the run id is malformed or the subjects
    /// cannot be listed; per-subject failures land in the report.
    pub async fn run(
        &self,
        as_of: NaiveDate,
        run_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, LedgerError> {
        let run_id = run_id.unwrap_or_else(|| default_run_id(as_of));
        validate_reference_id(&run_id)?;

        let mut tx = self.store.begin(LockScope::ReadOnly).await?;
        let subjects = tx.subjects_with_entries(&[]).await?;
        tx.rollback().await?;

        let mut report = SweepReport {
            run_id,
            as_of,
            subjects_scanned: subjects.len(),
            entries: Vec::new(),
            failures: Vec::new(),
        };

        for subject_id in subjects {
            match self.sweep_subject(subject_id, as_of, &report.run_id, now).await {
                Ok(mut written) => report.entries.append(&mut written),
                Err(e) => {
                    warn!(subject_id = %subject_id, error = %e, "Expiration sweep failed for subject");
                    report.failures.push(SweepFailure {
                        subject_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            run_id = %report.run_id,
            as_of = %as_of,
            subjects = report.subjects_scanned,
            rows = report.entries.len(),
            expired = %report.expired_amount(),
            failures = report.failures.len(),
            "Expiration sweep finished"
        );
        Ok(report)
    }

    /// Sweeps one subject in its own unit of work.
    ///
    /// # Errors
    ///
    /// Returns a storage error; nothing is written for the subject then.
    pub async fn sweep_subject(
        &self,
        subject_id: SubjectId,
        as_of: NaiveDate,
        run_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut tx = self
            .store
            .begin(LockScope::subject(subject_id, &BalanceType::ALL))
            .await?;

        let history = tx.get_entries(&EntryQuery::subject(subject_id)).await?;
        let swept: HashSet<LedgerEntryId> = tx
            .get_by_reference(ReferenceType::ExpirationJob, run_id, Some(EntryType::Expired))
            .await?
            .into_iter()
            .filter(|e| e.subject_id == subject_id)
            .filter_map(|e| e.drawn_from)
            .collect();

        let reference = EntryReference::new(ReferenceType::ExpirationJob, run_id);
        let mut written = Vec::new();
        for bucket in BucketAllocator::buckets(&history, &self.policies) {
            if !bucket.is_expired(as_of)
                || bucket.remaining_amount <= Decimal::ZERO
                || swept.contains(&bucket.entry_id)
            {
                continue;
            }
            let entry = tx
                .append(NewLedgerEntry {
                    subject_id,
                    period: bucket.period,
                    balance_type: bucket.balance_type,
                    entry_type: EntryType::Expired,
                    amount: bucket.remaining_amount,
                    reference: reference.clone(),
                    drawn_from: Some(bucket.entry_id),
                    expires_on: None,
                    created_by: None,
                    created_at: now,
                    notes: bucket.expiry_date.map(|d| format!("expired after {d}")),
                })
                .await?;
            written.push(entry);
        }

        if written.is_empty() {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }
        Ok(written)
    }
}
