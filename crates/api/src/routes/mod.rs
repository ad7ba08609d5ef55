//! API route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use praxis_core::ledger::LedgerError;
use praxis_shared::AppError;

use crate::AppState;

pub mod clients;
pub mod health;
pub mod payments;
pub mod reports;
pub mod sessions;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(clients::routes())
        .merge(sessions::routes())
        .merge(payments::routes())
        .merge(reports::routes())
}

/// Maps a ledger error to an HTTP response.
///
/// Persistence failures are reported as a generic message; their details
/// go to the logs, not the wire.
pub(crate) fn error_response(err: &LedgerError) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if status.is_server_error() {
        "The ledger is temporarily unavailable".to_string()
    } else {
        err.to_string()
    };

    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": message,
            "retryable": err.is_retryable(),
        })),
    )
        .into_response()
}

/// Parses a request amount string into `Money`.
///
/// Amounts travel as strings on the wire to keep 2-decimal precision
/// exact; floats never enter the system.
pub(crate) fn parse_amount(raw: &str) -> Result<praxis_shared::types::Money, Response> {
    use std::str::FromStr;

    let decimal = rust_decimal::Decimal::from_str(raw)
        .map_err(|_| validation_response(&format!("Invalid amount: {raw}")))?;
    praxis_shared::types::Money::try_new(decimal)
        .map_err(|e| error_response(&LedgerError::from(e)))
}

/// Maps a request validation failure to a 400 response.
pub(crate) fn validation_response(message: &str) -> Response {
    let err = AppError::Validation(message.to_string());
    (
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST),
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}
