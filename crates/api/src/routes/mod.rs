//! API route definitions.

use axum::{Router, response::Response};
use entitle_core::ledger::{LedgerError, LedgerStore};
use entitle_shared::types::BalanceType;

use crate::AppState;
use crate::error::{bad_request, ledger_error_response};

pub mod balances;
pub mod decisions;
pub mod health;
pub mod jobs;
pub mod reservations;

/// Creates the API router with all routes.
pub fn api_routes<S: LedgerStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .merge(health::routes())
        .merge(reservations::routes())
        .merge(decisions::routes())
        .merge(balances::routes())
        .merge(jobs::routes())
}

/// Parses a required `balance_type` query parameter.
fn require_balance_type(raw: Option<&str>) -> Result<BalanceType, Response> {
    let Some(raw) = raw else {
        return Err(bad_request(
            "MISSING_BALANCE_TYPE",
            "Query parameter balance_type is required",
        ));
    };
    BalanceType::parse(raw)
        .ok_or_else(|| ledger_error_response(&LedgerError::UnknownBalanceType(raw.to_string())))
}
