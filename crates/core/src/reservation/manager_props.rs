//! Property-based tests for concurrent reservation traffic.
//!
//! - Property 7: Holds and confirmations never exceed the pool
//! - Property 8: Confirmed holds and USAGE rows agree

use std::sync::Arc;

use chrono::Duration;
use entitle_shared::types::{BalanceType, SubjectId};
use futures::future::join_all;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tokio::sync::Barrier;

use super::manager::ReservationManager;
use super::types::{NewReservation, ReservationStatus};
use crate::ledger::test_support::{day, new_entry};
use crate::ledger::{EntryQuery, EntryType, LedgerStore, LedgerTx, LockScope, ReferenceType};
use crate::memory::MemoryLedgerStore;
use crate::policy::PolicyRegistry;

/// What a task does after its reserve call.
#[derive(Debug, Clone, Copy)]
enum Followup {
    Hold,
    Confirm,
    Cancel,
}

/// Strategy for one task: follow-up and amount in hundredths (0.01 to 8.00).
fn task_strategy() -> impl Strategy<Value = (Followup, i64)> {
    (
        prop_oneof![
            Just(Followup::Hold),
            Just(Followup::Confirm),
            Just(Followup::Cancel),
        ],
        1i64..800,
    )
}

/// Totals observed once every task finished.
struct Outcome {
    credited: Decimal,
    confirmed: Decimal,
    pending: Decimal,
    usage: Decimal,
}

fn run(credit_cents: i64, tasks: Vec<(Followup, i64)>) -> Outcome {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let store = Arc::new(MemoryLedgerStore::new());
        let subject = SubjectId::new();
        let credited = Decimal::new(credit_cents, 2);
        let mut tx = store
            .begin(LockScope::subject(subject, &[BalanceType::Rol]))
            .await
            .unwrap();
        tx.append(new_entry(subject, BalanceType::Rol, EntryType::Accrual, credited))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let manager = Arc::new(ReservationManager::new(
            Arc::clone(&store),
            Arc::new(PolicyRegistry::default()),
            Duration::days(30),
        ));
        let now = day(2025, 3, 1);
        let barrier = Arc::new(Barrier::new(tasks.len()));

        let handles: Vec<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(i, (followup, cents))| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    let reference_id = format!("LR-{i}");
                    barrier.wait().await;
                    let reserved = manager
                        .reserve(
                            NewReservation {
                                subject_id: subject,
                                balance_type: BalanceType::Rol,
                                amount: Decimal::new(cents, 2),
                                reference_type: ReferenceType::LeaveRequest,
                                reference_id: reference_id.clone(),
                                allow_negative: false,
                                expires_at: None,
                                created_by: None,
                            },
                            now,
                        )
                        .await;
                    if reserved.is_err() {
                        return;
                    }
                    match followup {
                        Followup::Hold => {}
                        Followup::Confirm => {
                            let _ = manager.confirm(&reference_id, now).await;
                        }
                        Followup::Cancel => {
                            let _ = manager.cancel(&reference_id, None, now).await;
                        }
                    }
                })
            })
            .collect();
        for handle in join_all(handles).await {
            handle.unwrap();
        }

        let reservations = manager.list(subject, None).await.unwrap();
        let sum_of = |status: ReservationStatus| -> Decimal {
            reservations
                .iter()
                .filter(|r| r.status == status)
                .map(|r| r.amount)
                .sum()
        };

        let mut tx = store.begin(LockScope::ReadOnly).await.unwrap();
        let entries = tx
            .get_entries(&EntryQuery::subject(subject).of_types(&[BalanceType::Rol]))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        let usage = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Usage)
            .map(|e| e.amount)
            .sum();

        Outcome {
            credited,
            confirmed: sum_of(ReservationStatus::Confirmed),
            pending: sum_of(ReservationStatus::Pending),
            usage,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// **Property 7.1: The pool is never overcommitted**
    ///
    /// *For any* credit and any mix of concurrent reserve, confirm and cancel
    /// calls, confirmed plus pending holds SHALL stay within the credit.
    #[test]
    fn prop_concurrent_traffic_never_overcommits(
        credit_cents in 100i64..2_000,
        tasks in prop::collection::vec(task_strategy(), 2..16),
    ) {
        let outcome = run(credit_cents, tasks);
        prop_assert!(outcome.confirmed + outcome.pending <= outcome.credited);
    }

    /// **Property 8.1: Every confirmed hold is backed by USAGE rows**
    ///
    /// *For any* concurrent traffic, the USAGE rows written SHALL sum to the
    /// confirmed holds.
    #[test]
    fn prop_usage_matches_confirmed_holds(
        credit_cents in 100i64..2_000,
        tasks in prop::collection::vec(task_strategy(), 2..16),
    ) {
        let outcome = run(credit_cents, tasks);
        prop_assert_eq!(outcome.usage, outcome.confirmed);
    }
}
