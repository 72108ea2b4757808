//! Incident Routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

use crate::AppState;
use storage::IncidentRecord;

/// Query parameters for incidents endpoint
#[derive(Debug, Deserialize)]
pub struct IncidentQuery {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for incidents endpoint
#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    /// Newest first
    pub data: Vec<IncidentRecord>,
    pub count: usize,
    pub total: usize,
}

/// Get logged incidents
pub async fn get_incidents(
    State(state): State<Arc<RwLock<AppState>>>,
    Query(params): Query<IncidentQuery>,
) -> Result<Json<IncidentResponse>, (StatusCode, String)> {
    let incident_log = state.read().await.incident_log.clone();
    let limit = params.limit.min(1000);

    let records = tokio::task::spawn_blocking(move || incident_log.load())
        .await
        .map_err(|e| {
            error!("Incident log reader failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .map_err(|e| {
            error!("Failed to read incident log: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let total = records.len();
    let data: Vec<_> = records.into_iter().rev().take(limit).collect();

    Ok(Json(IncidentResponse {
        count: data.len(),
        total,
        data,
    }))
}
