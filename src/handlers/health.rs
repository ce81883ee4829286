use axum::{extract::State, Json};
use chrono::Utc;
use tracing::warn;

use crate::models::health::{HealthResponse, ServiceStatus, StatusResponse};
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Probes the document store; always answers 200.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let database = match state.store.ping().await {
        Ok(()) => "healthy",
        Err(e) => {
            warn!(error = %e, "Document store ping failed");
            "unhealthy"
        }
    };
    let storage = if state.storage_configured {
        "configured"
    } else {
        "not_configured"
    };

    Json(StatusResponse {
        status: "operational".to_string(),
        services: ServiceStatus {
            api: "healthy".to_string(),
            database: database.to_string(),
            storage: storage.to_string(),
        },
        timestamp: Utc::now().to_rfc3339(),
    })
}
