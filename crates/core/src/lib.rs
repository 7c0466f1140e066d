//! Core business logic for Entitle.
//!
//! This crate contains the balance ledger and reservation engine with ZERO web
//! or database dependencies. Storage is reached through the
//! [`ledger::LedgerStore`] seam.
//!
//! # Modules
//!
//! - `ledger` - Append-only entries, balances and the storage seam
//! - `policy` - Per-balance-type metadata and the policy engine seam
//! - `bucket` - FIFO-with-priority allocation over credit buckets
//! - `reservation` - Tentative holds and their lifecycle
//! - `posting` - Orchestration of every balance-changing operation
//! - `sweep` - Write-off of expired bucket remainders
//! - `memory` - In-process store

pub mod bucket;
pub mod ledger;
pub mod memory;
pub mod policy;
pub mod posting;
pub mod reservation;
pub mod sweep;
