//! Client routes: CRUD, tender application, bulk settlement, and the
//! read-side exports (debt summary, payment history, allocation events).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    routes::{error_response, parse_amount, validation_response},
    routes::payments::PaymentResponse,
};
use praxis_core::ledger::{DebtAggregator, PaymentMethod};
use praxis_db::repositories::{
    AllocationRepository, ClientRepository, CreateClientInput, PaymentRepository, TenderInput,
};
use praxis_shared::types::{ClientId, PageRequest, PageResponse};

/// Creates the client routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients))
        .route("/clients", post(create_client))
        .route("/clients/{client_id}", get(get_client))
        .route("/clients/{client_id}", patch(update_client))
        .route("/clients/{client_id}/payments", post(apply_payment))
        .route("/clients/{client_id}/payments/settle-all", post(settle_all))
        .route("/clients/{client_id}/debt-summary", get(debt_summary))
        .route("/clients/{client_id}/payment-history", get(payment_history))
        .route("/clients/{client_id}/allocation-events", get(allocation_events))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a client.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    /// Full display name.
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    /// Contact email.
    #[validate(email)]
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

/// Request body for updating a client's contact details.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientRequest {
    /// Full display name.
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    /// Contact email.
    #[validate(email)]
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
}

/// Request body for applying a tender.
#[derive(Debug, Deserialize)]
pub struct ApplyPaymentRequest {
    /// Amount tendered.
    pub amount: String,
    /// How it was handed over.
    pub method: PaymentMethod,
    /// The payment to apply it to; omitted, the tender walks open
    /// payments oldest-first.
    pub target_payment_id: Option<Uuid>,
    /// Spend existing credit against the debt first.
    #[serde(default)]
    pub use_credit_first: bool,
}

/// Request body for bulk settlement.
#[derive(Debug, Deserialize)]
pub struct SettleAllRequest {
    /// Amount tendered.
    pub amount: String,
    /// How it was handed over.
    pub method: PaymentMethod,
    /// Client-generated key making resubmission safe.
    pub idempotency_key: Option<String>,
}

/// Query parameters for payment history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Earliest completion date (YYYY-MM-DD).
    pub from: Option<NaiveDate>,
    /// Latest completion date (YYYY-MM-DD).
    pub to: Option<NaiveDate>,
}

/// Response for a client.
#[derive(Debug, Serialize)]
pub struct ClientResponse {
    /// Client ID.
    pub id: Uuid,
    /// Full display name.
    pub full_name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Prepaid/overpaid balance.
    pub credit_balance: String,
    /// Creation timestamp.
    pub created_at: String,
}

impl ClientResponse {
    fn from_model(client: &praxis_db::entities::clients::Model) -> Self {
        Self {
            id: client.id,
            full_name: client.full_name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            credit_balance: client.credit_balance.to_string(),
            created_at: client.created_at.to_rfc3339(),
        }
    }
}

/// Response for an applied allocation.
#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    /// Payments that received money, in application order.
    pub updated_payments: Vec<PaymentResponse>,
    /// Signed net change to the credit balance.
    pub credit_delta: String,
    /// Credit balance after the allocation.
    pub remaining_credit: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/clients` - Create a client.
async fn create_client(
    State(state): State<AppState>,
    Json(body): Json<CreateClientRequest>,
) -> impl IntoResponse {
    if let Err(e) = body.validate() {
        return validation_response(&e.to_string());
    }

    let repo = ClientRepository::new((*state.db).clone());
    let input = CreateClientInput {
        full_name: body.full_name,
        email: body.email,
        phone: body.phone,
    };

    match repo.create(input).await {
        Ok(client) => {
            info!(client_id = %client.id, "Client created");
            (
                StatusCode::CREATED,
                Json(json!(ClientResponse::from_model(&client))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to create client");
            error_response(&e)
        }
    }
}

/// GET `/clients` - List clients, paginated.
async fn list_clients(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    let repo = ClientRepository::new((*state.db).clone());

    match repo.list(&page).await {
        Ok((clients, total)) => {
            let items: Vec<ClientResponse> =
                clients.iter().map(ClientResponse::from_model).collect();
            (
                StatusCode::OK,
                Json(json!(PageResponse::new(items, page.page, page.per_page, total))),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list clients");
            error_response(&e)
        }
    }
}

/// GET `/clients/{client_id}` - Get a client.
async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = ClientRepository::new((*state.db).clone());

    match repo.get(client_id).await {
        Ok(client) => (
            StatusCode::OK,
            Json(json!(ClientResponse::from_model(&client))),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// PATCH `/clients/{client_id}` - Update contact details.
async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(body): Json<UpdateClientRequest>,
) -> impl IntoResponse {
    if let Err(e) = body.validate() {
        return validation_response(&e.to_string());
    }

    let repo = ClientRepository::new((*state.db).clone());

    match repo
        .update_contact(client_id, body.full_name, body.email, body.phone)
        .await
    {
        Ok(client) => (
            StatusCode::OK,
            Json(json!(ClientResponse::from_model(&client))),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed to update client");
            error_response(&e)
        }
    }
}

/// POST `/clients/{client_id}/payments` - Apply a tender.
async fn apply_payment(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(body): Json<ApplyPaymentRequest>,
) -> impl IntoResponse {
    let amount = match parse_amount(&body.amount) {
        Ok(amount) => amount,
        Err(resp) => return resp,
    };
    if body.method == PaymentMethod::Credit {
        return validation_response(
            "method 'credit' is reserved for credit-funded entries; set use_credit_first instead",
        );
    }
    if body.use_credit_first && body.target_payment_id.is_none() {
        return validation_response("use_credit_first requires target_payment_id");
    }

    let repo = AllocationRepository::new((*state.db).clone())
        .with_retries(state.allocation_retries);
    let input = TenderInput {
        amount,
        method: body.method,
        target_payment_id: body.target_payment_id,
        use_credit_first: body.use_credit_first,
    };

    match repo.apply_payment(client_id, input).await {
        Ok(outcome) => {
            info!(
                client_id = %client_id,
                amount = %amount,
                credit_delta = %outcome.credit_delta,
                "Tender applied"
            );
            (
                StatusCode::OK,
                Json(json!(AllocationResponse {
                    updated_payments: outcome
                        .updated_payments
                        .iter()
                        .map(PaymentResponse::from_model)
                        .collect(),
                    credit_delta: outcome.credit_delta.to_string(),
                    remaining_credit: outcome.remaining_credit.to_string(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed to apply tender");
            error_response(&e)
        }
    }
}

/// POST `/clients/{client_id}/payments/settle-all` - Pay all debts.
async fn settle_all(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(body): Json<SettleAllRequest>,
) -> impl IntoResponse {
    let amount = match parse_amount(&body.amount) {
        Ok(amount) => amount,
        Err(resp) => return resp,
    };
    if body.method == PaymentMethod::Credit {
        return validation_response(
            "method 'credit' is reserved for credit-funded entries; set use_credit_first instead",
        );
    }

    let repo = AllocationRepository::new((*state.db).clone())
        .with_retries(state.allocation_retries);

    match repo
        .pay_all_debts(client_id, amount, body.method, body.idempotency_key)
        .await
    {
        Ok(outcome) => {
            info!(
                client_id = %client_id,
                amount = %amount,
                settled = outcome.updated_payments.len(),
                "Bulk settlement applied"
            );
            (
                StatusCode::OK,
                Json(json!(AllocationResponse {
                    updated_payments: outcome
                        .updated_payments
                        .iter()
                        .map(PaymentResponse::from_model)
                        .collect(),
                    credit_delta: outcome.credit_delta.to_string(),
                    remaining_credit: outcome.remaining_credit.to_string(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed bulk settlement");
            error_response(&e)
        }
    }
}

/// GET `/clients/{client_id}/debt-summary` - Debt and credit snapshot.
async fn debt_summary(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> impl IntoResponse {
    let clients = ClientRepository::new((*state.db).clone());
    let payments = PaymentRepository::new((*state.db).clone());

    let client = match clients.get(client_id).await {
        Ok(client) => client,
        Err(e) => return error_response(&e),
    };
    let credit = match praxis_shared::types::Money::try_new(client.credit_balance) {
        Ok(credit) => credit,
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Corrupt credit balance");
            return error_response(&praxis_core::ledger::LedgerError::Internal(e.to_string()));
        }
    };

    match payments.snapshots_for_client(client_id).await {
        Ok(snapshots) => {
            let summary = DebtAggregator::debt_summary(
                ClientId::from_uuid(client_id),
                credit,
                &snapshots,
            );
            (StatusCode::OK, Json(json!(summary))).into_response()
        }
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed to build debt summary");
            error_response(&e)
        }
    }
}

/// GET `/clients/{client_id}/payment-history` - Settled payments,
/// newest first.
async fn payment_history(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let repo = PaymentRepository::new((*state.db).clone());

    let from = query
        .from
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    // Inclusive end of day: the first instant of the next day, minus one
    // microsecond (Postgres timestamp resolution).
    let to = query
        .to
        .and_then(|d| d.succ_opt())
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)) - chrono::Duration::microseconds(1));

    match repo.settled_for_client(client_id).await {
        Ok(settled) => {
            let history = DebtAggregator::payment_history(settled, from, to);
            (StatusCode::OK, Json(json!({ "payments": history }))).into_response()
        }
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed to load payment history");
            error_response(&e)
        }
    }
}

/// GET `/clients/{client_id}/allocation-events` - Allocation outbox,
/// newest first.
async fn allocation_events(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = PaymentRepository::new((*state.db).clone());

    match repo.events_for_client(client_id).await {
        Ok(events) => (StatusCode::OK, Json(json!({ "events": events }))).into_response(),
        Err(e) => {
            error!(error = %e, client_id = %client_id, "Failed to load allocation events");
            error_response(&e)
        }
    }
}
