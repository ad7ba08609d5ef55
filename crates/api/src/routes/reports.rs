//! Reporting routes: monthly revenue totals.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::{AppState, routes::{error_response, validation_response}};
use praxis_core::ledger::{DebtAggregator, MonthKey};
use praxis_db::repositories::PaymentRepository;

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/reports/monthly-totals", get(monthly_totals))
}

/// Query parameters for monthly totals.
#[derive(Debug, Deserialize)]
pub struct MonthlyTotalsQuery {
    /// First month, inclusive (YYYY-MM).
    pub from: String,
    /// Last month, inclusive (YYYY-MM).
    pub to: String,
}

/// GET `/reports/monthly-totals` - Revenue per month.
///
/// A payment counts in the month its settling tender landed; open
/// partials are excluded until they close.
async fn monthly_totals(
    State(state): State<AppState>,
    Query(query): Query<MonthlyTotalsQuery>,
) -> impl IntoResponse {
    let from: MonthKey = match query.from.parse() {
        Ok(month) => month,
        Err(e) => return validation_response(&e),
    };
    let to: MonthKey = match query.to.parse() {
        Ok(month) => month,
        Err(e) => return validation_response(&e),
    };
    if from > to {
        return validation_response("from must not be after to");
    }

    let Some(range_start) = NaiveDate::from_ymd_opt(from.year, from.month, 1) else {
        return validation_response("invalid from month");
    };
    let Some(range_end) = NaiveDate::from_ymd_opt(to.next().year, to.next().month, 1) else {
        return validation_response("invalid to month");
    };
    let range_start = Utc.from_utc_datetime(&range_start.and_time(NaiveTime::MIN));
    let range_end = Utc.from_utc_datetime(&range_end.and_time(NaiveTime::MIN))
        - chrono::Duration::microseconds(1);

    let repo = PaymentRepository::new((*state.db).clone());

    match repo.settled_between(range_start, range_end).await {
        Ok(settled) => {
            let totals = DebtAggregator::monthly_totals(&settled, from, to);
            (StatusCode::OK, Json(json!({ "months": totals }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to compute monthly totals");
            error_response(&e)
        }
    }
}
