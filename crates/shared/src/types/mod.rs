//! Common types used across the application.

pub mod balance;
pub mod id;

pub use balance::{
    BalanceType, BalanceTypePolicy, BalanceUnit, ExpiryRule, PriorityClass, UnknownBalanceType,
};
pub use id::*;
