//! `SeaORM` entities for the ledger schema.

pub mod balance_locks;
pub mod ledger_entries;
pub mod reservations;
