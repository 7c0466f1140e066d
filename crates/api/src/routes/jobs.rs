//! On-demand job routes.
//!
//! The server also runs both jobs on a timer; these routes let an operator
//! trigger them outside the schedule.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::{NaiveDate, Utc};
use entitle_core::ledger::LedgerStore;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ledger_error_response;

/// Creates the job routes.
pub fn routes<S: LedgerStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/jobs/expiration-sweep", post(run_sweep::<S>))
        .route("/jobs/expire-reservations", post(expire_reservations::<S>))
}

/// Query parameters of a sweep run.
#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    /// Sweep date (defaults to today).
    pub as_of: Option<NaiveDate>,
    /// Run id; one per sweep date when omitted.
    pub run_id: Option<String>,
}

/// POST `/jobs/expiration-sweep` - Write off expired remainders.
async fn run_sweep<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<SweepQuery>,
) -> impl IntoResponse {
    let now = Utc::now();
    let as_of = query.as_of.unwrap_or_else(|| now.date_naive());
    match state.sweep.run(as_of, query.run_id, now).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "expired_amount": report.expired_amount(),
                "report": report,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_response(&e),
    }
}

/// POST `/jobs/expire-reservations` - Expire pending holds past their deadline.
async fn expire_reservations<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    match state.posting.reservations().expire_stale(Utc::now()).await {
        Ok(expired) => (
            StatusCode::OK,
            Json(json!({
                "expired": expired.len(),
                "reservations": expired,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_response(&e),
    }
}
