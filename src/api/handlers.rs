//! API handlers — consistent envelope, typed payloads, ISO-8601 timestamps.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::clients::PortalCredentials;
use crate::error::{PipelineError, StoreError};
use crate::gateway::SessionManager;
use crate::learning::LearningStore;
use crate::storage::audit::NotificationAudit;
use crate::sync::Orchestrator;
use crate::types::JobTrigger;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub session: Arc<SessionManager>,
    pub audit: NotificationAudit,
    pub learning: LearningStore,
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSyncRequest {
    pub cpf: String,
    pub password: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_owner")]
    pub owner: String,
}

fn default_owner() -> String {
    "api".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
}

fn default_recent_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub is_correct: bool,
    pub validator: String,
    #[serde(default)]
    pub notes: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /api/v1/sync/start`
pub async fn start_sync(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<StartSyncRequest>,
) -> Response {
    let credentials = PortalCredentials {
        cpf: req.cpf,
        password: req.password,
    };

    match state
        .orchestrator
        .start(JobTrigger::Manual, req.force, req.owner, credentials)
    {
        Ok(ticket) => ApiResponse::accepted(ticket),
        Err(PipelineError::Conflict(msg)) => ApiErrorResponse::conflict(msg),
        Err(PipelineError::Validation(msg)) => ApiErrorResponse::bad_request(msg),
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// `GET /api/v1/sync/jobs/:id`
pub async fn job_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.orchestrator.status(&id) {
        Some(job) => ApiResponse::ok(job),
        None => ApiErrorResponse::not_found(format!("no job {}", id)),
    }
}

/// `GET /api/v1/sync/jobs`
pub async fn list_jobs(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.orchestrator.list_jobs())
}

/// `GET /api/v1/gateway/status`
pub async fn gateway_status(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.session.status())
}

/// `GET /api/v1/gateway/pairing-code`
///
/// `204` when no code is pending (already paired, or the code expired).
pub async fn pairing_code(State(state): State<AppState>) -> Response {
    match state.session.pairing_code() {
        Some(code) => ApiResponse::ok(code),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /api/v1/notifications/recent?limit=`
pub async fn recent_notifications(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Response {
    ApiResponse::ok(state.audit.recent(query.limit))
}

/// `POST /api/v1/learning/:id/validate`
pub async fn validate_learning(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    axum::Json(req): axum::Json<ValidateRequest>,
) -> Response {
    match state
        .learning
        .validate(id, req.is_correct, &req.validator, &req.notes)
    {
        Ok(()) => {
            info!(entry_id = id, validator = %req.validator, "Decision validated");
            ApiResponse::ok(serde_json::json!({ "entry_id": id, "validated": true }))
        }
        Err(StoreError::NotFound(_)) => {
            ApiErrorResponse::not_found(format!("no learning entry {}", id))
        }
        Err(e) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// `GET /health`
pub async fn health() -> Response {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
