//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use entitle_core::ledger::{ErrorKind, LedgerError};
use serde_json::json;
use tracing::error;

/// Converts an engine error into a `{"error", "message"}` response.
///
/// Internal failures are logged and answered without their details.
pub fn ledger_error_response(err: &LedgerError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.kind() == ErrorKind::Internal {
        error!(error = %err, code = err.error_code(), "Request failed");
        return (
            status,
            Json(json!({
                "error": err.error_code(),
                "message": "An error occurred"
            })),
        )
            .into_response();
    }

    let mut body = json!({
        "error": err.error_code(),
        "message": err.to_string(),
    });
    if let LedgerError::InsufficientBalance {
        requested,
        available,
        ..
    } = err
    {
        body["requested"] = json!(requested);
        body["available"] = json!(available);
        body["shortfall"] = json!(err.shortfall());
        body["retryable"] = json!(false);
    } else if err.is_retryable() {
        body["retryable"] = json!(true);
    }
    (status, Json(body)).into_response()
}

/// Builds a 400 response for a malformed request parameter.
pub fn bad_request(code: &str, message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitle_shared::types::BalanceType;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(LedgerError::NonPositiveAmount(dec!(0)), StatusCode::BAD_REQUEST)]
    #[case(LedgerError::ReservationNotFound("LR-1".into()), StatusCode::NOT_FOUND)]
    #[case(LedgerError::ConcurrentModification, StatusCode::CONFLICT)]
    #[case(LedgerError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(LedgerError::Policy("timeout".into()), StatusCode::BAD_GATEWAY)]
    #[case(
        LedgerError::InsufficientBalance {
            balance_type: BalanceType::Rol,
            requested: dec!(5),
            available: dec!(2),
        },
        StatusCode::UNPROCESSABLE_ENTITY
    )]
    fn test_status_follows_error_kind(#[case] err: LedgerError, #[case] expected: StatusCode) {
        assert_eq!(ledger_error_response(&err).status(), expected);
    }
}
