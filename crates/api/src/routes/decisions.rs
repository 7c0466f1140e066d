//! Approval workflow callback.
//!
//! The workflow may deliver a decision more than once and out of order; the
//! posting service makes every delivery after the first a replay.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use entitle_core::ledger::LedgerStore;
use entitle_core::posting::Decision;
use serde::Deserialize;

use crate::AppState;
use crate::error::ledger_error_response;

/// Creates the decision routes.
pub fn routes<S: LedgerStore + 'static>() -> Router<AppState<S>> {
    Router::new().route("/decisions/{reference_id}", post(apply_decision::<S>))
}

/// Request body for a workflow decision.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// `APPROVED`, `REJECTED` or `CANCELLED`.
    pub decision: Decision,
    /// Optional reason recorded on a released hold.
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST `/decisions/{reference_id}` - Apply an approval decision.
async fn apply_decision<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(reference_id): Path<String>,
    Json(payload): Json<DecisionRequest>,
) -> impl IntoResponse {
    match state
        .posting
        .on_decision(&reference_id, payload.decision, payload.reason, Utc::now())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_response(&e),
    }
}
