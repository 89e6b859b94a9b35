//! Order event webhooks.
//!
//! The commerce host posts one request per Order event. Each request gets its
//! own once-token, so a signal repeated within a request is handled once.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crmsync_core::{CorrelationMeta, OnceToken, Order, OrderStatus, SyncError, SyncReport};
use tracing::info;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a new or newly processed order
#[derive(Debug, Deserialize)]
pub struct SyncOrderBody {
    pub order: Order,
}

/// Request body for a status change
#[derive(Debug, Deserialize)]
pub struct StatusChangeBody {
    pub order: Order,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

/// Request body for a campaign change. A missing campaign removes it.
#[derive(Debug, Deserialize)]
pub struct CampaignChangeBody {
    pub order: Order,
    #[serde(default)]
    pub campaign_id: Option<u64>,
}

/// Request body for a source change. A blank source removes it.
#[derive(Debug, Deserialize)]
pub struct SourceChangeBody {
    pub order: Order,
    #[serde(default)]
    pub source: String,
}

/// Result of an order event, with the notes to attach to the order
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub order_id: u64,
    pub trigger: String,
    pub outcome: String,
    pub contact_id: Option<u64>,
    pub contribution_id: Option<u64>,
    pub notes: Vec<String>,
}

impl From<SyncReport> for SyncResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            order_id: report.order_id,
            trigger: report.trigger.as_str().to_string(),
            outcome: report.outcome.as_str().to_string(),
            contact_id: report.contact_id,
            contribution_id: report.contribution_id,
            notes: report.notes,
        }
    }
}

/// Error response carrying the note for the order
#[derive(Debug, Serialize)]
pub struct SyncErrorResponse {
    pub order_id: u64,
    pub kind: String,
    pub error: String,
    pub note: String,
}

type SyncResult = Result<Json<SyncResponse>, (StatusCode, Json<SyncErrorResponse>)>;

fn error_response(order_id: u64, err: SyncError) -> (StatusCode, Json<SyncErrorResponse>) {
    let status = match &err {
        SyncError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SyncError::Api(_) => StatusCode::BAD_GATEWAY,
        SyncError::Consistency(_) => StatusCode::CONFLICT,
        SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(SyncErrorResponse {
            order_id,
            kind: err.kind().to_string(),
            error: err.to_string(),
            note: err.order_note(),
        }),
    )
}

fn respond(order_id: u64, result: Result<SyncReport, SyncError>) -> SyncResult {
    match result {
        Ok(report) => {
            info!(
                order_id,
                trigger = %report.trigger,
                outcome = report.outcome.as_str(),
                "Order event handled"
            );
            Ok(Json(SyncResponse::from(report)))
        }
        Err(e) => Err(error_response(order_id, e)),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Sync a new or newly processed order
pub async fn sync_order(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncOrderBody>,
) -> SyncResult {
    let mut token = OnceToken::new();
    let result = state.sync().on_order_created(&body.order, &mut token).await;
    respond(body.order.id, result)
}

/// Apply an order status change
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusChangeBody>,
) -> SyncResult {
    let mut token = OnceToken::new();
    let result = state
        .sync()
        .on_status_changed(&body.order, body.old_status, body.new_status, &mut token)
        .await;
    respond(body.order.id, result)
}

/// Apply an order campaign change
pub async fn change_campaign(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CampaignChangeBody>,
) -> SyncResult {
    let mut token = OnceToken::new();
    let result = state
        .sync()
        .on_campaign_changed(&body.order, body.campaign_id, &mut token)
        .await;
    respond(body.order.id, result)
}

/// Apply an order source change
pub async fn change_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SourceChangeBody>,
) -> SyncResult {
    let mut token = OnceToken::new();
    let result = state
        .sync()
        .on_source_changed(&body.order, &body.source, &mut token)
        .await;
    respond(body.order.id, result)
}

/// CRM identifiers recorded for an order
pub async fn get_correlation(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<u64>,
) -> Result<Json<CorrelationMeta>, (StatusCode, Json<SyncErrorResponse>)> {
    state
        .correlation()
        .get(order_id)
        .map(Json)
        .map_err(|e| error_response(order_id, e.into()))
}
