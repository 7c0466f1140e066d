//! Posting orchestration.
//!
//! Every ledger write goes through [`PostingService`]: holds via the policy
//! engine and the reservation manager, approval decisions, direct credits and
//! manual corrections. Each write is one unit of work and is idempotent by
//! business reference.

pub mod service;
pub mod types;

pub use service::PostingService;
pub use types::{
    BalanceLine, BalanceSummary, BucketView, Decision, DecisionOutcome, NewCredit, NewDebit,
    PostingResult, ReconciliationReport, Violation,
};
