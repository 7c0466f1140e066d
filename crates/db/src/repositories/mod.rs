//! Repository implementations for data access.
//!
//! - `ledger_store` - Postgres implementation of the ledger storage seam

pub mod ledger_store;

pub use ledger_store::{PgLedgerStore, PgLedgerTx};
