pub mod cors;
pub mod health;
pub mod history;
pub mod official;
pub mod prices;

use axum::{http::StatusCode, middleware, routing::get, Json, Router};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::StoreError;
use crate::models::health::ErrorResponse;
use crate::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

pub(crate) fn internal_error(e: StoreError) -> ApiError {
    error!(error = %e, "Document store error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
}

async fn not_found() -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}

/// Read API routes with CORS on every response, including the fallback.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_prices", get(prices::get_current_prices))
        .route("/api/prices", get(official::get_official_prices))
        .route("/get_price_history", get(history::get_price_history))
        .route("/health", get(health::health))
        .route("/api/status", get(health::status))
        .fallback(not_found)
        .layer(middleware::from_fn(cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
