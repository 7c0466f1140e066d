//! Property-based tests for bucket allocation.
//!
//! - Property 4: Allocation covers exactly the requested amount
//! - Property 5: FIFO-with-priority drains buckets as a prefix
//! - Property 6: Allocation is independent of insertion order

use chrono::{Duration, NaiveDate};
use entitle_shared::types::{BalanceType, SubjectId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::allocator::BucketAllocator;
use crate::ledger::test_support::{day, entry};
use crate::ledger::{EntryType, LedgerEntry, LedgerError};
use crate::policy::PolicyRegistry;

/// Strategy for one credit: (carried over?, day offset, amount in hundredths).
fn credit_strategy() -> impl Strategy<Value = (bool, i64, i64)> {
    (any::<bool>(), 0i64..60, 1i64..10_000)
}

/// Strategy for a pool history of 1 to 12 credits.
fn credits_strategy() -> impl Strategy<Value = Vec<(bool, i64, i64)>> {
    prop::collection::vec(credit_strategy(), 1..12)
}

/// Strategy for a requested amount (0.01 to 1,500.00).
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..150_000).prop_map(|n| Decimal::new(n, 2))
}

fn build(subject: SubjectId, credits: &[(bool, i64, i64)]) -> Vec<LedgerEntry> {
    credits
        .iter()
        .map(|(carried, offset, cents)| {
            let entry_type = if *carried {
                EntryType::CarryOver
            } else {
                EntryType::Accrual
            };
            let mut e = entry(subject, 2025, BalanceType::Rol, entry_type, Decimal::new(*cents, 2));
            e.created_at = day(2025, 1, 1) + Duration::days(*offset);
            e
        })
        .collect()
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 15).unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 4.1: Sufficient balance is covered exactly**
    ///
    /// *For any* pool and any amount not exceeding its total, allocation SHALL
    /// succeed, sum to the amount, and never overdraw a bucket.
    #[test]
    fn prop_allocation_sums_to_amount(
        credits in credits_strategy(),
        amount in amount_strategy(),
    ) {
        let registry = PolicyRegistry::default();
        let entries = build(SubjectId::new(), &credits);
        let total: Decimal = entries.iter().map(|e| e.amount).sum();
        prop_assume!(amount <= total);

        let attributions = BucketAllocator::allocate(
            &entries, &registry, BalanceType::Rol, amount, day(2025, 3, 15), false,
        ).unwrap();

        prop_assert_eq!(attributions.iter().map(|a| a.amount).sum::<Decimal>(), amount);
        for a in &attributions {
            prop_assert!(!a.overdraft);
            let source = entries.iter().find(|e| Some(e.id) == a.drawn_from).unwrap();
            prop_assert!(a.amount <= source.amount);
            prop_assert!(a.amount > Decimal::ZERO);
        }
    }

    /// **Property 4.2: Shortfall without override is rejected**
    ///
    /// *For any* amount above the pool total, allocation SHALL fail with
    /// `InsufficientBalance` reporting the total as available.
    #[test]
    fn prop_shortfall_rejected(
        credits in credits_strategy(),
        extra in 1i64..10_000,
    ) {
        let registry = PolicyRegistry::default();
        let entries = build(SubjectId::new(), &credits);
        let total: Decimal = entries.iter().map(|e| e.amount).sum();
        let amount = total + Decimal::new(extra, 2);

        let result = BucketAllocator::allocate(
            &entries, &registry, BalanceType::Rol, amount, day(2025, 3, 15), false,
        );
        match result {
            Err(LedgerError::InsufficientBalance { requested, available, .. }) => {
                prop_assert_eq!(requested, amount);
                prop_assert_eq!(available, total);
            }
            other => prop_assert!(false, "unexpected result: {:?}", other),
        }
    }

    /// **Property 4.3: Override always covers the amount**
    ///
    /// *For any* pool and amount, allocation with override SHALL sum to the
    /// amount, with at most one overdraft row.
    #[test]
    fn prop_override_covers_amount(
        credits in credits_strategy(),
        amount in amount_strategy(),
    ) {
        let registry = PolicyRegistry::default();
        let entries = build(SubjectId::new(), &credits);

        let attributions = BucketAllocator::allocate(
            &entries, &registry, BalanceType::Rol, amount, day(2025, 3, 15), true,
        ).unwrap();

        prop_assert_eq!(attributions.iter().map(|a| a.amount).sum::<Decimal>(), amount);
        prop_assert!(attributions.iter().filter(|a| a.overdraft).count() <= 1);
    }

    /// **Property 5.1: Drawn buckets form a prefix of consumption order**
    ///
    /// *For any* allocation, every drawn bucket except the last SHALL be
    /// drained completely, and drawn buckets SHALL be the first ones in
    /// consumption order.
    #[test]
    fn prop_draws_are_a_prefix(
        credits in credits_strategy(),
        amount in amount_strategy(),
    ) {
        let registry = PolicyRegistry::default();
        let entries = build(SubjectId::new(), &credits);
        let total: Decimal = entries.iter().map(|e| e.amount).sum();
        prop_assume!(amount <= total);

        let buckets = BucketAllocator::buckets(&entries, &registry);
        let available = BucketAllocator::available_buckets(&buckets, as_of());
        let attributions = BucketAllocator::walk(&available, amount);

        for (i, a) in attributions.iter().enumerate() {
            prop_assert_eq!(a.drawn_from, Some(available[i].entry_id));
            if i + 1 < attributions.len() {
                prop_assert_eq!(a.amount, available[i].remaining_amount);
            }
        }
    }

    /// **Property 6.1: Insertion order does not change allocation**
    ///
    /// *For any* pool history and any permutation of it, allocation SHALL
    /// produce identical attributions.
    #[test]
    fn prop_insertion_order_independent(
        (credits, order) in credits_strategy().prop_flat_map(|c| {
            let len = c.len();
            (Just(c), Just((0..len).collect::<Vec<_>>()).prop_shuffle())
        }),
        amount in amount_strategy(),
    ) {
        let registry = PolicyRegistry::default();
        let entries = build(SubjectId::new(), &credits);
        let permuted: Vec<LedgerEntry> = order.iter().map(|i| entries[*i].clone()).collect();

        let a = BucketAllocator::allocate(
            &entries, &registry, BalanceType::Rol, amount, day(2025, 3, 15), true,
        ).unwrap();
        let b = BucketAllocator::allocate(
            &permuted, &registry, BalanceType::Rol, amount, day(2025, 3, 15), true,
        ).unwrap();
        prop_assert_eq!(a, b);
    }
}
