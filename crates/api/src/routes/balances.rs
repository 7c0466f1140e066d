//! Balance, ledger and bucket routes, plus direct postings.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{Datelike, NaiveDate, Utc};
use entitle_core::ledger::{EntryType, LedgerStore, ReferenceType};
use entitle_core::posting::{NewCredit, NewDebit, PostingResult};
use entitle_shared::types::{BalanceType, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::require_balance_type;
use crate::AppState;
use crate::error::ledger_error_response;

/// Creates the balance routes.
pub fn routes<S: LedgerStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/subjects/{subject_id}/balances", get(get_balances::<S>))
        .route("/subjects/{subject_id}/ledger", get(get_ledger::<S>))
        .route("/subjects/{subject_id}/buckets", get(get_buckets::<S>))
        .route("/subjects/{subject_id}/credits", post(post_credit::<S>))
        .route(
            "/subjects/{subject_id}/adjustments",
            post(post_adjustment::<S>),
        )
        .route(
            "/subjects/{subject_id}/reconciliation",
            get(reconcile::<S>),
        )
}

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters selecting a period.
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    /// Fiscal year; balances default to the current one.
    pub period: Option<i32>,
}

/// Query parameters for the bucket view.
#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    /// Any member of the pool to show.
    pub balance_type: Option<String>,
    /// Day expiry is evaluated on (defaults to today).
    pub as_of: Option<NaiveDate>,
}

/// Request body for a direct credit.
#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    /// Fiscal year the credit belongs to.
    pub period: i32,
    /// Balance type credited.
    pub balance_type: BalanceType,
    /// `ACCRUAL`, `ADJUSTMENT_ADD` or `CARRY_OVER`.
    pub entry_type: EntryType,
    /// Amount credited.
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id.
    pub reference_id: String,
    /// Explicit last valid day.
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
    /// Who posted it.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Free text.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for a manual debit correction.
#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    /// Balance type debited.
    pub balance_type: BalanceType,
    /// Amount debited.
    pub amount: Decimal,
    /// Business event id of the correction.
    pub reference_id: String,
    /// Whether the correction may overdraw.
    #[serde(default)]
    pub allow_negative: bool,
    /// Who posted it.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Free text.
    #[serde(default)]
    pub notes: Option<String>,
}

fn posting_response(result: PostingResult) -> axum::response::Response {
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(result)).into_response()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/subjects/{subject_id}/balances` - Per-type balances of a period.
async fn get_balances<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    let period = query.period.unwrap_or_else(|| Utc::now().year());
    match state.posting.get_balance_summary(subject_id, period).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => ledger_error_response(&e),
    }
}

/// GET `/subjects/{subject_id}/ledger` - Entries of a subject, optionally of one period.
async fn get_ledger<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Query(query): Query<PeriodQuery>,
) -> impl IntoResponse {
    match state.posting.get_ledger(subject_id, query.period).await {
        Ok(entries) => (StatusCode::OK, Json(json!({ "entries": entries }))).into_response(),
        Err(e) => ledger_error_response(&e),
    }
}

/// GET `/subjects/{subject_id}/buckets` - Buckets of a pool in allocation order.
async fn get_buckets<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Query(query): Query<BucketQuery>,
) -> impl IntoResponse {
    let balance_type = match require_balance_type(query.balance_type.as_deref()) {
        Ok(bt) => bt,
        Err(response) => return response,
    };
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    match state
        .posting
        .get_buckets(subject_id, balance_type, as_of)
        .await
    {
        Ok(buckets) => (StatusCode::OK, Json(json!({ "buckets": buckets }))).into_response(),
        Err(e) => ledger_error_response(&e),
    }
}

/// POST `/subjects/{subject_id}/credits` - Post a credit.
async fn post_credit<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Json(payload): Json<CreditRequest>,
) -> impl IntoResponse {
    let credit = NewCredit {
        subject_id,
        period: payload.period,
        balance_type: payload.balance_type,
        entry_type: payload.entry_type,
        amount: payload.amount,
        reference_type: payload.reference_type,
        reference_id: payload.reference_id,
        expires_on: payload.expires_on,
        created_by: payload.created_by,
        notes: payload.notes,
    };
    match state.posting.post_credit(credit, Utc::now()).await {
        Ok(result) => posting_response(result),
        Err(e) => ledger_error_response(&e),
    }
}

/// POST `/subjects/{subject_id}/adjustments` - Post a manual debit correction.
async fn post_adjustment<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Json(payload): Json<AdjustmentRequest>,
) -> impl IntoResponse {
    let debit = NewDebit {
        subject_id,
        balance_type: payload.balance_type,
        amount: payload.amount,
        reference_type: ReferenceType::ManualAdjustment,
        reference_id: payload.reference_id,
        allow_negative: payload.allow_negative,
        created_by: payload.created_by,
        notes: payload.notes,
    };
    match state.posting.post_debit_adjustment(debit, Utc::now()).await {
        Ok(result) => posting_response(result),
        Err(e) => ledger_error_response(&e),
    }
}

/// GET `/subjects/{subject_id}/reconciliation` - Replay a subject's history.
async fn reconcile<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
) -> impl IntoResponse {
    match state.posting.reconcile(subject_id).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "consistent": report.is_consistent(),
                "report": report,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_response(&e),
    }
}
