//! Property-based tests for ledger write validation.
//!
//! - Property 1: Negative amounts never reach the ledger
//! - Property 2: Requested amounts must be strictly positive

use proptest::prelude::*;
use rust_decimal::Decimal;
use entitle_shared::types::{BalanceType, SubjectId};

use super::entry::EntryType;
use super::error::LedgerError;
use super::test_support::new_entry;
use super::validation::{validate_new_entry, validate_requested_amount};

/// Strategy to generate a non-negative amount (0.00 to 1,000,000.00).
fn non_negative_amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a negative amount.
fn negative_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(-cents, 2))
}

/// Strategy to generate an entry type.
fn entry_type_strategy() -> impl Strategy<Value = EntryType> {
    prop::sample::select(EntryType::ALL.to_vec())
}

/// Strategy to generate a balance type.
fn balance_type_strategy() -> impl Strategy<Value = BalanceType> {
    prop::sample::select(BalanceType::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1.1: Negative amounts are rejected**
    ///
    /// *For any* entry type and balance type, an entry with a negative amount
    /// SHALL be rejected with `NegativeAmount`.
    #[test]
    fn prop_negative_amount_rejected(
        entry_type in entry_type_strategy(),
        balance_type in balance_type_strategy(),
        amount in negative_amount(),
    ) {
        let entry = new_entry(SubjectId::new(), balance_type, entry_type, amount);
        prop_assert!(matches!(validate_new_entry(&entry), Err(LedgerError::NegativeAmount)));
    }

    /// **Property 1.2: Non-negative amounts are accepted**
    ///
    /// *For any* entry with amount >= 0 and a valid reference, validation SHALL succeed.
    #[test]
    fn prop_non_negative_amount_accepted(
        entry_type in entry_type_strategy(),
        balance_type in balance_type_strategy(),
        amount in non_negative_amount(),
    ) {
        let entry = new_entry(SubjectId::new(), balance_type, entry_type, amount);
        prop_assert!(validate_new_entry(&entry).is_ok());
    }

    /// **Property 2.1: Requested amounts must be positive**
    ///
    /// *For any* amount, `validate_requested_amount` SHALL accept it iff amount > 0.
    #[test]
    fn prop_requested_amount_positive(
        cents in -100_000i64..100_000i64,
    ) {
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(validate_requested_amount(amount).is_ok(), cents > 0);
    }
}
