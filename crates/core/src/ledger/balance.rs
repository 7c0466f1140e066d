//! Balance calculations.
//!
//! Balances are never stored. They are folded from immutable entries on every
//! read, so a balance is always reconstructible from history.

use std::collections::BTreeMap;

use entitle_shared::types::BalanceType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::LedgerEntry;

/// Balance of one `(subject, period, balance_type)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of credit amounts.
    pub credited: Decimal,
    /// Sum of debit amounts.
    pub debited: Decimal,
    /// `credited - debited`, never clamped.
    pub balance: Decimal,
}

impl Balance {
    /// Folds one entry into the balance.
    pub fn apply(&mut self, entry: &LedgerEntry) {
        if entry.entry_type.is_credit() {
            self.credited += entry.amount;
        } else {
            self.debited += entry.amount;
        }
        self.balance = self.credited - self.debited;
    }
}

/// Stateless balance aggregation.
pub struct BalanceCalculator;

impl BalanceCalculator {
    /// Computes the balance of one period and balance type.
    ///
    /// Entries for other periods or balance types are ignored, so callers may
    /// pass the whole history of a subject.
    #[must_use]
    pub fn compute_balance(
        entries: &[LedgerEntry],
        period: i32,
        balance_type: BalanceType,
    ) -> Balance {
        entries
            .iter()
            .filter(|e| e.period == period && e.balance_type == balance_type)
            .fold(Balance::default(), |mut acc, e| {
                acc.apply(e);
                acc
            })
    }

    /// Computes balances for every balance type with entries in the period.
    #[must_use]
    pub fn compute_all_balances(
        entries: &[LedgerEntry],
        period: i32,
    ) -> BTreeMap<BalanceType, Balance> {
        let mut balances: BTreeMap<BalanceType, Balance> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.period == period) {
            balances.entry(entry.balance_type).or_default().apply(entry);
        }
        balances
    }
}
