//! Session routes: scheduling CRUD and charge creation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    AppState,
    routes::{error_response, parse_amount, validation_response},
    routes::payments::PaymentResponse,
};
use praxis_core::ledger::SessionKind;
use praxis_db::entities::sessions;
use praxis_db::repositories::{
    CreateSessionInput, PaymentRepository, SessionRepository, UpdateSessionInput,
};
use praxis_shared::types::{PageRequest, PageResponse};

/// Creates the session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(get_session))
        .route("/sessions/{session_id}", patch(update_session))
        .route("/sessions/{session_id}/payment", post(create_payment))
        .route("/clients/{client_id}/sessions", get(list_sessions))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// The client the session belongs to.
    pub client_id: Uuid,
    /// Scheduled start (RFC 3339).
    pub start_time: DateTime<Utc>,
    /// Scheduled end (RFC 3339).
    pub end_time: DateTime<Utc>,
    /// Kind of session.
    pub kind: SessionKind,
    /// Charge for the session.
    pub price: String,
}

/// Request body for updating a session.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    /// New start time.
    pub start_time: Option<DateTime<Utc>>,
    /// New end time.
    pub end_time: Option<DateTime<Utc>>,
    /// New price; rejected once a payment exists.
    pub price: Option<String>,
}

/// Response for a session.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Session ID.
    pub id: Uuid,
    /// The client.
    pub client_id: Uuid,
    /// Scheduled start.
    pub start_time: String,
    /// Scheduled end.
    pub end_time: String,
    /// Kind of session.
    pub kind: SessionKind,
    /// Charge for the session.
    pub price: String,
}

impl SessionResponse {
    fn from_model(session: &sessions::Model) -> Self {
        Self {
            id: session.id,
            client_id: session.client_id,
            start_time: session.start_time.to_rfc3339(),
            end_time: session.end_time.to_rfc3339(),
            kind: session.kind.clone().into(),
            price: session.price.to_string(),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/sessions` - Schedule a session.
async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    if body.end_time <= body.start_time {
        return validation_response("end_time must be after start_time");
    }
    let price = match parse_amount(&body.price) {
        Ok(price) => price,
        Err(resp) => return resp,
    };

    let repo = SessionRepository::new((*state.db).clone());
    let input = CreateSessionInput {
        client_id: body.client_id,
        start_time: body.start_time,
        end_time: body.end_time,
        kind: body.kind,
        price,
    };

    match repo.create(input).await {
        Ok(session) => {
            info!(session_id = %session.id, client_id = %session.client_id, "Session scheduled");
            (
                StatusCode::CREATED,
                Json(json!(SessionResponse::from_model(&session))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to create session");
            error_response(&e)
        }
    }
}

/// GET `/sessions/{session_id}` - Get a session.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = SessionRepository::new((*state.db).clone());

    match repo.get(session_id).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!(SessionResponse::from_model(&session))),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// PATCH `/sessions/{session_id}` - Reschedule or reprice a session.
async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<UpdateSessionRequest>,
) -> impl IntoResponse {
    let price = match body.price.as_deref().map(parse_amount).transpose() {
        Ok(price) => price,
        Err(resp) => return resp,
    };

    let repo = SessionRepository::new((*state.db).clone());
    let input = UpdateSessionInput {
        start_time: body.start_time,
        end_time: body.end_time,
        price,
    };

    match repo.update(session_id, input).await {
        Ok(session) => (
            StatusCode::OK,
            Json(json!(SessionResponse::from_model(&session))),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, session_id = %session_id, "Failed to update session");
            error_response(&e)
        }
    }
}

/// GET `/clients/{client_id}/sessions` - List a client's sessions.
async fn list_sessions(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    let repo = SessionRepository::new((*state.db).clone());

    match repo.list_for_client(client_id, &page).await {
        Ok((sessions, total)) => {
            let items: Vec<SessionResponse> =
                sessions.iter().map(SessionResponse::from_model).collect();
            (
                StatusCode::OK,
                Json(json!(PageResponse::new(items, page.page, page.per_page, total))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed to list sessions");
            error_response(&e)
        }
    }
}

/// POST `/sessions/{session_id}/payment` - Create (or return) the payment
/// for a session.
async fn create_payment(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = PaymentRepository::new((*state.db).clone());

    match repo.create_for_session(session_id).await {
        Ok(payment) => {
            info!(session_id = %session_id, payment_id = %payment.id, "Payment created");
            (
                StatusCode::CREATED,
                Json(json!(PaymentResponse::from_model(&payment))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, session_id = %session_id, "Failed to create payment");
            error_response(&e)
        }
    }
}
