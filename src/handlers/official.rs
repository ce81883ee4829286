//! GET /api/prices returns the official-prices collection verbatim,
//! keyed by document id.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{internal_error, ApiError};
use crate::AppState;

pub const OFFICIAL_CACHE_KEY: &str = "official_prices";
pub const CACHE_CONTROL: &str = "public, max-age=300";

pub async fn get_official_prices(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = match state.official_cache.get(OFFICIAL_CACHE_KEY).await {
        Some(cached) => {
            debug!("Official prices served from cache");
            cached
        }
        None => {
            let docs = state.store.official_prices().await.map_err(internal_error)?;
            let body: Map<String, Value> = docs
                .into_iter()
                .map(|doc| (doc.id, json!({ "price": doc.price })))
                .collect();
            let body = Value::Object(body);
            state
                .official_cache
                .insert(OFFICIAL_CACHE_KEY, body.clone())
                .await;
            body
        }
    };

    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    Ok(response)
}
