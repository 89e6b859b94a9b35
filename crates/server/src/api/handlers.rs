use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use crmsync_core::SanitizedConfig;
use tracing::info;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

/// Drop cached financial types, price field values and dedupe rules so
/// changes made in the CRM are picked up.
pub async fn invalidate_cache(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    state.sync().cache().invalidate().await;
    info!("CRM lookup cache invalidated on request");
    Json(HealthResponse {
        status: "invalidated".to_string(),
    })
}
