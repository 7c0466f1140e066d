//! Reservation routes.
//!
//! Holds are placed through the policy engine; the open total is what the
//! subject has pending against one balance type.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use entitle_core::ledger::{LedgerStore, ReferenceType};
use entitle_core::policy::ConsumptionRequest;
use entitle_core::reservation::ReservationStatus;
use entitle_shared::types::{BalanceType, SubjectId, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::require_balance_type;
use crate::AppState;
use crate::error::{bad_request, ledger_error_response};

/// Creates the reservation routes.
pub fn routes<S: LedgerStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/subjects/{subject_id}/reservations",
            post(create_reservation::<S>).get(list_reservations::<S>),
        )
        .route(
            "/subjects/{subject_id}/reservations/open",
            get(open_reservations::<S>),
        )
        .route(
            "/subjects/{subject_id}/available",
            get(available::<S>),
        )
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for placing a hold.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// Balance type requested.
    pub balance_type: BalanceType,
    /// Amount requested.
    pub amount: Decimal,
    /// Kind of business event.
    pub reference_type: ReferenceType,
    /// Business event id.
    pub reference_id: String,
    /// Whether the caller asks to overdraw.
    #[serde(default)]
    pub allow_negative: bool,
    /// Explicit reservation deadline.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Who submitted the request.
    #[serde(default)]
    pub created_by: Option<UserId>,
}

/// Query parameters naming a balance type.
#[derive(Debug, Deserialize)]
pub struct BalanceTypeQuery {
    /// Balance type, e.g. `VACATION_AC`.
    pub balance_type: Option<String>,
    /// Day the availability is evaluated on (defaults to today).
    pub as_of: Option<NaiveDate>,
}

/// Query parameters for listing reservations.
#[derive(Debug, Deserialize)]
pub struct ListReservationsQuery {
    /// Status filter, e.g. `PENDING`.
    pub status: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/subjects/{subject_id}/reservations` - Evaluate a request and place a hold.
///
/// Answers 201 for a new hold and 200 when the reference was already held.
async fn create_reservation<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Json(payload): Json<CreateReservationRequest>,
) -> impl IntoResponse {
    // Storage keeps microseconds; a replay is recognized by its older timestamp.
    let now = Utc::now().trunc_subsecs(6);
    let request = ConsumptionRequest {
        subject_id,
        balance_type: payload.balance_type,
        amount: payload.amount,
        reference_type: payload.reference_type,
        reference_id: payload.reference_id,
        allow_negative: payload.allow_negative,
        expires_at: payload.expires_at,
        created_by: payload.created_by,
    };

    match state.posting.validate_and_reserve(request, now).await {
        Ok(reservation) => {
            let status = if reservation.created_at == now {
                info!(
                    subject_id = %subject_id,
                    reference_id = %reservation.reference_id,
                    amount = %reservation.amount,
                    "Reservation created"
                );
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(reservation)).into_response()
        }
        Err(e) => ledger_error_response(&e),
    }
}

/// GET `/subjects/{subject_id}/reservations` - List a subject's reservations.
async fn list_reservations<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Query(query): Query<ListReservationsQuery>,
) -> impl IntoResponse {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match ReservationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return bad_request("INVALID_STATUS", format!("Unknown reservation status: {raw}"));
            }
        },
    };

    match state.posting.reservations().list(subject_id, status).await {
        Ok(reservations) => {
            (StatusCode::OK, Json(json!({ "reservations": reservations }))).into_response()
        }
        Err(e) => ledger_error_response(&e),
    }
}

/// GET `/subjects/{subject_id}/reservations/open` - Pending total of one balance type.
async fn open_reservations<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Query(query): Query<BalanceTypeQuery>,
) -> impl IntoResponse {
    let balance_type = match require_balance_type(query.balance_type.as_deref()) {
        Ok(bt) => bt,
        Err(response) => return response,
    };

    match state
        .posting
        .reservations()
        .open_reservations(subject_id, balance_type)
        .await
    {
        Ok(total) => (
            StatusCode::OK,
            Json(json!({
                "subject_id": subject_id,
                "balance_type": balance_type,
                "reserved": total,
            })),
        )
            .into_response(),
        Err(e) => ledger_error_response(&e),
    }
}

/// GET `/subjects/{subject_id}/available` - Spendable, reserved and available of a pool.
async fn available<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(subject_id): Path<SubjectId>,
    Query(query): Query<BalanceTypeQuery>,
) -> impl IntoResponse {
    let balance_type = match require_balance_type(query.balance_type.as_deref()) {
        Ok(bt) => bt,
        Err(response) => return response,
    };
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    match state
        .posting
        .get_available(subject_id, balance_type, as_of)
        .await
    {
        Ok(availability) => (StatusCode::OK, Json(availability)).into_response(),
        Err(e) => ledger_error_response(&e),
    }
}
