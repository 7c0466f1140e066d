//! Configuration-driven balance type metadata.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use entitle_shared::LedgerConfig;
use entitle_shared::types::{BalanceType, BalanceTypePolicy, PriorityClass};

use crate::ledger::{EntryType, LedgerEntry};

/// Lookup table of [`BalanceTypePolicy`] by balance type.
///
/// Starts from [`BalanceTypePolicy::defaults`]; configured policies replace
/// the default of their type. Pool membership is symmetric: a type listed in
/// another type's pool joins that pool.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<BalanceType, BalanceTypePolicy>,
}

impl PolicyRegistry {
    /// Creates a registry, overriding defaults with `policies`.
    pub fn new(policies: impl IntoIterator<Item = BalanceTypePolicy>) -> Self {
        let mut map: HashMap<BalanceType, BalanceTypePolicy> = BalanceTypePolicy::defaults()
            .into_iter()
            .map(|p| (p.balance_type, p))
            .collect();
        for policy in policies {
            map.insert(policy.balance_type, policy);
        }
        Self { policies: map }
    }

    /// Creates a registry from the `ledger` configuration section.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.policies.iter().cloned())
    }

    /// Policy of a balance type.
    #[must_use]
    pub fn policy(&self, balance_type: BalanceType) -> BalanceTypePolicy {
        self.policies
            .get(&balance_type)
            .cloned()
            .unwrap_or_else(|| BalanceTypePolicy::new(balance_type))
    }

    /// Every balance type consumed together with `balance_type`, itself included, sorted.
    #[must_use]
    pub fn pool(&self, balance_type: BalanceType) -> Vec<BalanceType> {
        let mut members = BTreeSet::from([balance_type]);
        let mut frontier = vec![balance_type];

        while let Some(current) = frontier.pop() {
            let declared = self
                .policies
                .get(&current)
                .map(|p| p.pool.clone())
                .unwrap_or_default();
            let declaring = self
                .policies
                .values()
                .filter(|p| p.pool.contains(&current))
                .map(|p| p.balance_type);

            for member in declared.into_iter().chain(declaring) {
                if members.insert(member) {
                    frontier.push(member);
                }
            }
        }

        members.into_iter().collect()
    }

    /// Priority class of a credit entry. Carry-over credits are always carried over.
    #[must_use]
    pub fn priority_class(&self, entry: &LedgerEntry) -> PriorityClass {
        if entry.entry_type == EntryType::CarryOver {
            return PriorityClass::CarriedOver;
        }
        self.policies
            .get(&entry.balance_type)
            .map_or(PriorityClass::Current, |p| p.priority_class)
    }

    /// Last valid day of a credit entry, if it expires.
    #[must_use]
    pub fn expiry_date(&self, entry: &LedgerEntry) -> Option<NaiveDate> {
        entry.expires_on.or_else(|| {
            self.policies.get(&entry.balance_type).and_then(|p| {
                p.expiry
                    .expiry_date(entry.period, entry.created_at.date_naive())
            })
        })
    }

    /// Whether the type permits overdraft without an explicit override.
    #[must_use]
    pub fn allows_negative(&self, balance_type: BalanceType) -> bool {
        self.policies
            .get(&balance_type)
            .is_some_and(|p| p.allow_negative)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_support::{day, entry};
    use entitle_shared::types::{ExpiryRule, SubjectId};
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_vacation_pool_is_symmetric() {
        let registry = PolicyRegistry::default();
        let expected = vec![BalanceType::VacationAp, BalanceType::VacationAc];
        assert_eq!(registry.pool(BalanceType::VacationAp), expected);
        assert_eq!(registry.pool(BalanceType::VacationAc), expected);
        assert_eq!(registry.pool(BalanceType::Rol), vec![BalanceType::Rol]);
    }

    #[test]
    fn test_one_sided_pool_declaration_joins_both() {
        let mut permits = BalanceTypePolicy::new(BalanceType::Permits);
        permits.pool = vec![BalanceType::Rol];
        let registry = PolicyRegistry::new([permits]);
        assert_eq!(
            registry.pool(BalanceType::Rol),
            vec![BalanceType::Rol, BalanceType::Permits]
        );
    }

    #[test]
    fn test_carry_over_is_always_carried_over() {
        let registry = PolicyRegistry::default();
        let subject = SubjectId::new();
        let carry = entry(subject, 2025, BalanceType::Rol, EntryType::CarryOver, dec!(4));
        let accrual = entry(subject, 2025, BalanceType::Rol, EntryType::Accrual, dec!(4));
        assert_eq!(registry.priority_class(&carry), PriorityClass::CarriedOver);
        assert_eq!(registry.priority_class(&accrual), PriorityClass::Current);
    }

    #[test]
    fn test_vacation_ap_expires_end_of_june() {
        let registry = PolicyRegistry::default();
        let ap = entry(
            SubjectId::new(),
            2025,
            BalanceType::VacationAp,
            EntryType::Accrual,
            dec!(5),
        );
        assert_eq!(registry.expiry_date(&ap), NaiveDate::from_ymd_opt(2025, 6, 30));
        assert_eq!(registry.priority_class(&ap), PriorityClass::CarriedOver);
    }

    #[test]
    fn test_explicit_expiry_overrides_rule() {
        let registry = PolicyRegistry::default();
        let mut ac = entry(
            SubjectId::new(),
            2025,
            BalanceType::VacationAc,
            EntryType::Accrual,
            dec!(5),
        );
        assert_eq!(registry.expiry_date(&ac), None);
        ac.expires_on = NaiveDate::from_ymd_opt(2025, 3, 31);
        assert_eq!(registry.expiry_date(&ac), NaiveDate::from_ymd_opt(2025, 3, 31));
    }

    #[test]
    fn test_configured_policy_replaces_default() {
        let mut trip = BalanceTypePolicy::new(BalanceType::TripBudget);
        trip.allow_negative = true;
        trip.expiry = ExpiryRule::AfterCreation { days: 30 };
        let registry = PolicyRegistry::new([trip]);

        assert!(registry.allows_negative(BalanceType::TripBudget));
        assert!(!registry.allows_negative(BalanceType::Rol));

        let mut advance = entry(
            SubjectId::new(),
            2025,
            BalanceType::TripBudget,
            EntryType::Accrual,
            dec!(500),
        );
        advance.created_at = day(2025, 3, 1);
        assert_eq!(
            registry.expiry_date(&advance),
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
    }
}
