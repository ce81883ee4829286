//! Current prices handler
//!
//! GET /get_prices compares the vendor buy-back price of each capacity with
//! the official list price.

use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{bad_request, internal_error, ApiError};
use crate::models::catalog::{Catalog, Series};
use crate::models::official::find_for_series;
use crate::models::prices::{CapacityComparison, CurrentPricesResponse, PricesQuery};
use crate::AppState;

fn resolve_series(catalog: &Catalog, raw: Option<&str>) -> Result<Series, String> {
    match raw {
        None => Ok(Series::Standard),
        Some(name) => catalog.parse_series(name).ok_or_else(|| {
            format!(
                "Invalid series: '{}'. Valid series are: {}",
                name,
                catalog.names().join(", ")
            )
        }),
    }
}

/// GET /get_prices
///
/// # Query Parameters
/// - `series`: series name (default: the standard model)
///
/// # Response
/// - 200: per-capacity comparison, zeros where data is missing
/// - 400: unknown series
/// - 500: store error
pub async fn get_current_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<CurrentPricesResponse>, ApiError> {
    let series = resolve_series(&state.catalog, query.series.as_deref()).map_err(|e| {
        warn!(series = ?query.series, "Rejected current prices request");
        bad_request(e)
    })?;

    let current = state
        .store
        .current_for_series(series)
        .await
        .map_err(internal_error)?;
    let official_docs = state.store.official_prices().await.map_err(internal_error)?;
    let official = find_for_series(&official_docs, &state.catalog, series);

    let prices: BTreeMap<_, _> = series
        .capacities()
        .iter()
        .map(|&capacity| {
            let official_price = official.map(|doc| doc.price_for(capacity)).unwrap_or(0);
            let kaitori_price = current
                .iter()
                .find(|r| r.capacity == capacity)
                .map(|r| r.kaitori_price_min.get())
                .unwrap_or(0);
            (capacity, CapacityComparison::new(official_price, kaitori_price))
        })
        .collect();

    info!(
        series = %state.catalog.name(series),
        records = current.len(),
        official = official.is_some(),
        "Served current prices"
    );

    Ok(Json(CurrentPricesResponse {
        series: state.catalog.name(series),
        prices,
    }))
}
