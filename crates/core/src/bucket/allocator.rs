//! FIFO-with-priority bucket allocation.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use entitle_shared::types::{BalanceType, LedgerEntryId};
use rust_decimal::Decimal;

use super::types::{Attribution, Bucket};
use crate::ledger::{LedgerEntry, LedgerError};
use crate::policy::PolicyRegistry;

/// Stateless bucket allocation.
///
/// Buckets are rebuilt from the ledger on every call: a bucket's remaining
/// amount is its credit minus every debit whose `drawn_from` points at it.
pub struct BucketAllocator;

impl BucketAllocator {
    /// Builds a bucket for every credit entry, in consumption order.
    ///
    /// Consumption order is priority class (carried-over first), then
    /// `created_at` ascending, then entry id.
    #[must_use]
    pub fn buckets(entries: &[LedgerEntry], policies: &PolicyRegistry) -> Vec<Bucket> {
        let consumed = consumed_by_bucket(entries);

        let mut buckets: Vec<Bucket> = entries
            .iter()
            .filter(|e| e.entry_type.is_credit())
            .map(|e| {
                let consumed_amount = consumed.get(&e.id).copied().unwrap_or_default();
                Bucket {
                    entry_id: e.id,
                    subject_id: e.subject_id,
                    balance_type: e.balance_type,
                    period: e.period,
                    entry_type: e.entry_type,
                    original_amount: e.amount,
                    consumed_amount,
                    remaining_amount: e.amount - consumed_amount,
                    priority_class: policies.priority_class(e),
                    expiry_date: policies.expiry_date(e),
                    created_at: e.created_at,
                }
            })
            .collect();

        buckets.sort_by(|a, b| a.consumption_key().cmp(&b.consumption_key()));
        buckets
    }

    /// Buckets that can still be drawn from on `as_of`, in consumption order.
    #[must_use]
    pub fn available_buckets(buckets: &[Bucket], as_of: NaiveDate) -> Vec<Bucket> {
        buckets
            .iter()
            .filter(|b| !b.is_expired(as_of) && b.remaining_amount > Decimal::ZERO)
            .cloned()
            .collect()
    }

    /// Sum of debits not attributed to any known bucket.
    #[must_use]
    pub fn unattributed_debits(entries: &[LedgerEntry]) -> Decimal {
        let credit_ids: Vec<LedgerEntryId> = entries
            .iter()
            .filter(|e| e.entry_type.is_credit())
            .map(|e| e.id)
            .collect();

        entries
            .iter()
            .filter(|e| e.entry_type.is_debit())
            .filter(|e| e.drawn_from.is_none_or(|id| !credit_ids.contains(&id)))
            .map(|e| e.amount)
            .sum()
    }

    /// Amount spendable on `as_of`, before open reservations.
    ///
    /// Expired buckets contribute nothing positive (their remainder is waiting
    /// for the sweep) but an overdrawn expired bucket still counts against the
    /// subject.
    #[must_use]
    pub fn spendable(entries: &[LedgerEntry], policies: &PolicyRegistry, as_of: NaiveDate) -> Decimal {
        let buckets = Self::buckets(entries, policies);
        let from_buckets: Decimal = buckets
            .iter()
            .map(|b| {
                if b.is_expired(as_of) {
                    b.remaining_amount.min(Decimal::ZERO)
                } else {
                    b.remaining_amount
                }
            })
            .sum();
        from_buckets - Self::unattributed_debits(entries)
    }

    /// Plans how `amount` is drawn from a pool's history.
    ///
    /// `entries` must hold every entry of the pool (all periods). Without
    /// `allow_negative` the request fails when `amount` exceeds the spendable
    /// amount. With it, the shortfall becomes an overdraft attribution against
    /// the most recent live bucket, or an unattributed row of `balance_type`
    /// when the pool has none.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveAmount` for `amount <= 0` and `InsufficientBalance`
    /// when the pool cannot cover the amount.
    pub fn allocate(
        entries: &[LedgerEntry],
        policies: &PolicyRegistry,
        balance_type: BalanceType,
        amount: Decimal,
        as_of: DateTime<Utc>,
        allow_negative: bool,
    ) -> Result<Vec<Attribution>, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }

        let today = as_of.date_naive();
        let spendable = Self::spendable(entries, policies, today);
        if amount > spendable && !allow_negative {
            return Err(LedgerError::InsufficientBalance {
                balance_type,
                requested: amount,
                available: spendable.max(Decimal::ZERO),
            });
        }

        let buckets = Self::buckets(entries, policies);
        let available = Self::available_buckets(&buckets, today);
        let mut attributions = Self::walk(&available, amount);

        let drawn: Decimal = attributions.iter().map(|a| a.amount).sum();
        let shortfall = amount - drawn;
        if shortfall > Decimal::ZERO {
            let target = buckets
                .iter()
                .filter(|b| !b.is_expired(today))
                .max_by(|a, b| (a.created_at, a.entry_id).cmp(&(b.created_at, b.entry_id)));

            attributions.push(Attribution::overdraft(
                target,
                balance_type,
                as_of.year(),
                shortfall,
            ));
        }

        Ok(attributions)
    }

    /// Draws `amount` from `available` in order, never exceeding a bucket's remainder.
    ///
    /// Returns fewer than `amount` in total when the buckets run out.
    #[must_use]
    pub fn walk(available: &[Bucket], amount: Decimal) -> Vec<Attribution> {
        let mut outstanding = amount;
        let mut attributions = Vec::new();

        for bucket in available {
            if outstanding <= Decimal::ZERO {
                break;
            }
            let portion = outstanding.min(bucket.remaining_amount);
            if portion <= Decimal::ZERO {
                continue;
            }
            attributions.push(Attribution::draw(bucket, portion));
            outstanding -= portion;
        }

        attributions
    }
}

fn consumed_by_bucket(entries: &[LedgerEntry]) -> HashMap<LedgerEntryId, Decimal> {
    let mut consumed: HashMap<LedgerEntryId, Decimal> = HashMap::new();
    for entry in entries.iter().filter(|e| e.entry_type.is_debit()) {
        if let Some(bucket) = entry.drawn_from {
            *consumed.entry(bucket).or_default() += entry.amount;
        }
    }
    consumed
}
