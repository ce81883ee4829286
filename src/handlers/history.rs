//! Price History handler
//!
//! GET /get_price_history returns the recent time series for one
//! (series, capacity) pair.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

use super::official::CACHE_CONTROL;
use super::{bad_request, internal_error, ApiError};
use crate::models::history::{HistoryPoint, HistoryQuery, HistoryResponse};
use crate::services::history::HistoryService;
use crate::AppState;

/// GET /get_price_history
///
/// # Query Parameters
/// - `series`: series name (default: the standard model)
/// - `capacity`: e.g. `256GB` (default: 128GB)
/// - `days`: 1..=365 (default: 14)
///
/// # Response
/// - 200: history sorted ascending by timestamp
/// - 400: invalid series, capacity or days
/// - 500: store error
pub async fn get_price_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let valid = query.validate(&state.catalog).map_err(|e| {
        warn!(error = %e, "Rejected price history request");
        bad_request(e)
    })?;

    // Retention only matters for writes
    let history = HistoryService::new(state.store.clone(), 0);
    let records = history
        .recent(valid.series, valid.capacity, valid.days, Utc::now())
        .await
        .map_err(internal_error)?;

    info!(
        series = %state.catalog.name(valid.series),
        capacity = %valid.capacity,
        days = valid.days,
        count = records.len(),
        "Price history query completed"
    );

    let body = HistoryResponse {
        series: state.catalog.name(valid.series),
        capacity: valid.capacity,
        days: valid.days,
        history: records.iter().map(HistoryPoint::from).collect(),
    };

    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    Ok(response)
}
