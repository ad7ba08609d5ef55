//! Payment lifecycle routes: lookup, cancellation, refund.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, routes::{error_response, parse_amount, validation_response}};
use praxis_core::ledger::{PaymentMethod, PaymentStatus};
use praxis_db::repositories::payment::{PaymentRepository, PaymentWithEntries};
use praxis_db::entities::{payment_entries, payments};

/// Creates the payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/{payment_id}", get(get_payment))
        .route("/payments/{payment_id}/cancel", post(cancel_payment))
        .route("/payments/{payment_id}/refund", post(refund_payment))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for cancelling a payment.
#[derive(Debug, Deserialize, Validate)]
pub struct CancelPaymentRequest {
    /// Why the payment is being cancelled.
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Request body for refunding a payment.
#[derive(Debug, Deserialize, Validate)]
pub struct RefundPaymentRequest {
    /// Amount to refund, at most what was paid.
    pub amount: String,
    /// Why the payment is being refunded.
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Response for a payment.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Payment ID.
    pub id: Uuid,
    /// The charged session.
    pub session_id: Uuid,
    /// The owing client.
    pub client_id: Uuid,
    /// Frozen charge amount.
    pub expected_amount: String,
    /// Lifecycle status.
    pub status: String,
    /// When the settling tender landed.
    pub paid_at: Option<String>,
    /// Cancellation reason, if cancelled.
    pub cancel_reason: Option<String>,
    /// Refunded amount, if refunded.
    pub refunded_amount: Option<String>,
    /// Refund reason, if refunded.
    pub refund_reason: Option<String>,
    /// When the refund was recorded.
    pub refunded_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

impl PaymentResponse {
    /// Builds the response from a payment row.
    #[must_use]
    pub fn from_model(payment: &payments::Model) -> Self {
        Self {
            id: payment.id,
            session_id: payment.session_id,
            client_id: payment.client_id,
            expected_amount: payment.expected_amount.to_string(),
            status: PaymentStatus::from(payment.status.clone()).to_string(),
            paid_at: payment.paid_at.map(|t| t.to_rfc3339()),
            cancel_reason: payment.cancel_reason.clone(),
            refunded_amount: payment.refunded_amount.map(|a| a.to_string()),
            refund_reason: payment.refund_reason.clone(),
            refunded_at: payment.refunded_at.map(|t| t.to_rfc3339()),
            created_at: payment.created_at.to_rfc3339(),
        }
    }
}

/// Response for one tender entry.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Entry ID.
    pub id: Uuid,
    /// Tendered amount.
    pub amount: String,
    /// How it was handed over.
    pub method: String,
    /// When it was recorded.
    pub paid_at: String,
}

impl EntryResponse {
    fn from_model(entry: &payment_entries::Model) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount.to_string(),
            method: PaymentMethod::from(entry.method.clone()).to_string(),
            paid_at: entry.paid_at.to_rfc3339(),
        }
    }
}

/// Response for a payment with its tender timeline.
#[derive(Debug, Serialize)]
pub struct PaymentDetailResponse {
    /// The payment.
    #[serde(flatten)]
    pub payment: PaymentResponse,
    /// Tender entries, oldest first.
    pub entries: Vec<EntryResponse>,
}

impl PaymentDetailResponse {
    /// Builds the response from a payment and its entries.
    #[must_use]
    pub fn from_parts(with_entries: &PaymentWithEntries) -> Self {
        Self {
            payment: PaymentResponse::from_model(&with_entries.payment),
            entries: with_entries
                .entries
                .iter()
                .map(EntryResponse::from_model)
                .collect(),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/payments/{payment_id}` - Get a payment with its tender timeline.
async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = PaymentRepository::new((*state.db).clone());

    match repo.get(payment_id).await {
        Ok(with_entries) => (
            StatusCode::OK,
            Json(json!(PaymentDetailResponse::from_parts(&with_entries))),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, payment_id = %payment_id, "Failed to load payment");
            error_response(&e)
        }
    }
}

/// POST `/payments/{payment_id}/cancel` - Cancel a pending payment.
async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<CancelPaymentRequest>,
) -> impl IntoResponse {
    if let Err(e) = body.validate() {
        return validation_response(&e.to_string());
    }

    let repo = PaymentRepository::new((*state.db).clone());

    match repo.cancel(payment_id, body.reason).await {
        Ok(payment) => {
            info!(payment_id = %payment_id, "Payment cancelled");
            (
                StatusCode::OK,
                Json(json!(PaymentResponse::from_model(&payment))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, payment_id = %payment_id, "Failed to cancel payment");
            error_response(&e)
        }
    }
}

/// POST `/payments/{payment_id}/refund` - Refund a settled payment.
async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(body): Json<RefundPaymentRequest>,
) -> impl IntoResponse {
    if let Err(e) = body.validate() {
        return validation_response(&e.to_string());
    }
    let amount = match parse_amount(&body.amount) {
        Ok(amount) => amount,
        Err(resp) => return resp,
    };

    let repo = PaymentRepository::new((*state.db).clone());

    match repo.refund(payment_id, amount, body.reason).await {
        Ok(payment) => {
            info!(payment_id = %payment_id, amount = %amount, "Payment refunded");
            (
                StatusCode::OK,
                Json(json!(PaymentResponse::from_model(&payment))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, payment_id = %payment_id, "Failed to refund payment");
            error_response(&e)
        }
    }
}
