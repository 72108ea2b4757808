//! Monitor Status Routes

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::status::MonitorStatus;
use crate::AppState;

/// Response for the overlay toggle
#[derive(Debug, Serialize)]
pub struct OverlayResponse {
    pub overlay_enabled: bool,
}

/// Latest status snapshot from the capture loop
pub async fn get_status(State(state): State<Arc<RwLock<AppState>>>) -> Json<MonitorStatus> {
    let state = state.read().await;
    let status = state.monitor.status.borrow().clone();
    Json(status)
}

/// Flip landmark visualization on published frames
pub async fn toggle_overlay(State(state): State<Arc<RwLock<AppState>>>) -> Json<OverlayResponse> {
    let state = state.read().await;
    let overlay_enabled = state.monitor.toggle_overlay();
    info!("Landmark overlay {}", if overlay_enabled { "enabled" } else { "disabled" });
    Json(OverlayResponse { overlay_enabled })
}
