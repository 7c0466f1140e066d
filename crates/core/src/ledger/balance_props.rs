//! Property-based tests for balance aggregation.
//!
//! - Property 3: Balance equals credits minus debits in any order

use proptest::prelude::*;
use rust_decimal::Decimal;
use entitle_shared::types::{BalanceType, SubjectId};

use super::balance::BalanceCalculator;
use super::entry::{EntryType, LedgerEntry};
use super::test_support::entry;

/// Strategy to generate an entry amount (0.00 to 1,000.00).
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate an entry type.
fn entry_type_strategy() -> impl Strategy<Value = EntryType> {
    prop::sample::select(EntryType::ALL.to_vec())
}

/// Strategy to generate a history of `(entry_type, amount)` pairs.
fn history_strategy() -> impl Strategy<Value = Vec<(EntryType, Decimal)>> {
    prop::collection::vec((entry_type_strategy(), amount_strategy()), 0..40)
}

fn build(subject: SubjectId, history: &[(EntryType, Decimal)]) -> Vec<LedgerEntry> {
    history
        .iter()
        .map(|(entry_type, amount)| entry(subject, 2025, BalanceType::Rol, *entry_type, *amount))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 3.1: Balance is credits minus debits**
    ///
    /// *For any* sequence of entries, balance SHALL equal the sum of credit
    /// amounts minus the sum of debit amounts.
    #[test]
    fn prop_balance_is_credits_minus_debits(history in history_strategy()) {
        let entries = build(SubjectId::new(), &history);

        let credits: Decimal = history.iter().filter(|(t, _)| t.is_credit()).map(|(_, a)| *a).sum();
        let debits: Decimal = history.iter().filter(|(t, _)| t.is_debit()).map(|(_, a)| *a).sum();

        let balance = BalanceCalculator::compute_balance(&entries, 2025, BalanceType::Rol);
        prop_assert_eq!(balance.credited, credits);
        prop_assert_eq!(balance.debited, debits);
        prop_assert_eq!(balance.balance, credits - debits);
    }

    /// **Property 3.2: Balance is order independent**
    ///
    /// *For any* sequence of entries and any permutation of it, the computed
    /// balance SHALL be identical.
    #[test]
    fn prop_balance_is_order_independent(
        (history, shuffled) in history_strategy()
            .prop_flat_map(|h| (Just(h.clone()), Just(h).prop_shuffle())),
    ) {
        let subject = SubjectId::new();
        let entries = build(subject, &history);
        let permuted = build(subject, &shuffled);

        prop_assert_eq!(
            BalanceCalculator::compute_balance(&entries, 2025, BalanceType::Rol),
            BalanceCalculator::compute_balance(&permuted, 2025, BalanceType::Rol)
        );
    }

    /// **Property 3.3: Per-type map agrees with single-type balance**
    ///
    /// *For any* history, `compute_all_balances` SHALL agree with
    /// `compute_balance` for every type it returns.
    #[test]
    fn prop_all_balances_agree(history in history_strategy()) {
        let entries = build(SubjectId::new(), &history);
        let all = BalanceCalculator::compute_all_balances(&entries, 2025);
        for (balance_type, balance) in all {
            prop_assert_eq!(
                balance,
                BalanceCalculator::compute_balance(&entries, 2025, balance_type)
            );
        }
    }
}
