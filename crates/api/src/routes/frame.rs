//! Latest Frame Route

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::AppState;

/// Latest processed frame as JPEG, 404 until the first frame arrives
pub async fn get_frame(State(state): State<Arc<RwLock<AppState>>>) -> Response {
    let state = state.read().await;
    let frame = state.monitor.frame.borrow().clone();

    match frame {
        Some(jpeg) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg.as_ref().clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "no frame captured yet").into_response(),
    }
}
