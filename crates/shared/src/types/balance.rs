//! Balance type vocabulary and per-type policy data.
//!
//! `BalanceType` is a closed enum; everything that varies per type (priority,
//! expiry, pooling, overdraft) is plain data loaded from configuration.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of consumable entitlement tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceType {
    /// Vacation carried over from previous years.
    VacationAp,
    /// Vacation accrued in the current year.
    VacationAc,
    /// Reduction of working hours (ROL).
    Rol,
    /// Statutory permits (ex-holidays, study leave).
    Permits,
    /// Monetary budget for trip advances and expenses.
    TripBudget,
}

impl BalanceType {
    /// Every balance type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::VacationAp,
        Self::VacationAc,
        Self::Rol,
        Self::Permits,
        Self::TripBudget,
    ];

    /// Returns the string representation of the balance type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VacationAp => "VACATION_AP",
            Self::VacationAc => "VACATION_AC",
            Self::Rol => "ROL",
            Self::Permits => "PERMITS",
            Self::TripBudget => "TRIP_BUDGET",
        }
    }

    /// Parses a balance type from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "VACATION_AP" => Some(Self::VacationAp),
            "VACATION_AC" => Some(Self::VacationAc),
            "ROL" => Some(Self::Rol),
            "PERMITS" => Some(Self::Permits),
            "TRIP_BUDGET" => Some(Self::TripBudget),
            _ => None,
        }
    }
}

impl fmt::Display for BalanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a balance type string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown balance type: {0}")]
pub struct UnknownBalanceType(pub String);

impl FromStr for BalanceType {
    type Err = UnknownBalanceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownBalanceType(s.to_string()))
    }
}

/// Unit a balance is measured in. Informational only; arithmetic is unit-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceUnit {
    /// Working days.
    #[default]
    Days,
    /// Working hours.
    Hours,
    /// Money in the organization's currency.
    Currency,
}

/// Consumption priority of a bucket.
///
/// Ordering matters: `CarriedOver` sorts before `Current`, which is the order
/// the allocator drains buckets in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityClass {
    /// Entitlement carried over from a previous period (consumed first).
    CarriedOver,
    /// Entitlement of the current period.
    #[default]
    Current,
}

/// When a credit stops being spendable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpiryRule {
    /// Credits never expire.
    #[default]
    Never,
    /// Credits expire on a fixed calendar date relative to their period.
    FixedDate {
        /// Month of the deadline (1-12).
        month: u32,
        /// Day of the deadline.
        day: u32,
        /// Years after the credit's period the deadline falls in.
        #[serde(default)]
        years_after_period: i32,
    },
    /// Credits expire a fixed number of days after they were posted.
    AfterCreation {
        /// Days of validity.
        days: i64,
    },
}

impl ExpiryRule {
    /// Returns the last valid day for a credit of `period` posted on `created_on`.
    ///
    /// Returns `None` for `Never` and for rules that describe an impossible
    /// date (e.g. February 30th) or a year outside the calendar range.
    #[must_use]
    pub fn expiry_date(&self, period: i32, created_on: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Self::Never => None,
            Self::FixedDate {
                month,
                day,
                years_after_period,
            } => period
                .checked_add(years_after_period)
                .and_then(|year| NaiveDate::from_ymd_opt(year, month, day)),
            Self::AfterCreation { days } => created_on.checked_add_signed(Duration::days(days)),
        }
    }
}

/// Configuration-driven metadata for one balance type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTypePolicy {
    /// The balance type this policy applies to.
    pub balance_type: BalanceType,
    /// Priority class of ordinary credits of this type.
    #[serde(default)]
    pub priority_class: PriorityClass,
    /// Expiry rule for credits of this type.
    #[serde(default)]
    pub expiry: ExpiryRule,
    /// Other balance types consumed together with this one.
    #[serde(default)]
    pub pool: Vec<BalanceType>,
    /// Whether consumption may drive the balance negative without an explicit override.
    #[serde(default)]
    pub allow_negative: bool,
    /// Unit of measure.
    #[serde(default)]
    pub unit: BalanceUnit,
}

impl BalanceTypePolicy {
    /// Creates a policy with defaults: current priority, no expiry, no pool.
    #[must_use]
    pub fn new(balance_type: BalanceType) -> Self {
        Self {
            balance_type,
            priority_class: PriorityClass::Current,
            expiry: ExpiryRule::Never,
            pool: Vec::new(),
            allow_negative: false,
            unit: BalanceUnit::Days,
        }
    }

    /// Built-in policies used when configuration does not override them.
    ///
    /// Carried-over vacation is drained before current vacation and lapses on
    /// June 30th of its period.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                priority_class: PriorityClass::CarriedOver,
                expiry: ExpiryRule::FixedDate {
                    month: 6,
                    day: 30,
                    years_after_period: 0,
                },
                pool: vec![BalanceType::VacationAc],
                ..Self::new(BalanceType::VacationAp)
            },
            Self {
                pool: vec![BalanceType::VacationAp],
                ..Self::new(BalanceType::VacationAc)
            },
            Self {
                unit: BalanceUnit::Hours,
                expiry: ExpiryRule::FixedDate {
                    month: 12,
                    day: 31,
                    years_after_period: 1,
                },
                ..Self::new(BalanceType::Rol)
            },
            Self {
                unit: BalanceUnit::Hours,
                ..Self::new(BalanceType::Permits)
            },
            Self {
                unit: BalanceUnit::Currency,
                ..Self::new(BalanceType::TripBudget)
            },
        ]
    }
}
