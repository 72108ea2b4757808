//! Drowsiness Monitor Application
//!
//! Capture pipeline plus a local HTTP status surface showing the incident
//! counter, current incident duration and the latest annotated frame.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod metrics;
pub mod overlay;
pub mod pipeline;
pub mod status;

mod routes;

pub use config::{AppConfig, LoggingConfig};
pub use pipeline::{MonitorHandle, Pipeline, PipelineOptions};
pub use status::MonitorStatus;

use storage::IncidentLog;

/// Application state shared across handlers
pub struct AppState {
    /// Incident log
    pub incident_log: Arc<IncidentLog>,
    /// Capture loop outputs and controls
    pub monitor: MonitorHandle,
    /// Prometheus exposition, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        incident_log: Arc<IncidentLog>,
        monitor: MonitorHandle,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            incident_log,
            monitor,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub capture: ComponentHealth,
    pub incident_log: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Create the application router
pub fn create_router(state: Arc<RwLock<AppState>>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/overlay/toggle", post(routes::status::toggle_overlay))
        .route("/api/v1/incidents", get(routes::incidents::get_incidents))
        .route("/api/v1/frame", get(routes::frame::get_frame))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let monitor = state.monitor.status.borrow().clone();
    let capture = ComponentHealth {
        status: if monitor.running { "ok" } else { "stopped" }.to_string(),
        detail: Some(format!("{} frames processed", monitor.frames_processed)),
    };
    let log = state.incident_log.clone();
    let count = tokio::task::spawn_blocking(move || log.count())
        .await
        .map_err(|e| e.to_string())
        .and_then(|count| count.map_err(|e| e.to_string()));
    let incident_log = match count {
        Ok(count) => ComponentHealth {
            status: "ok".to_string(),
            detail: Some(format!("{} incidents", count)),
        },
        Err(e) => ComponentHealth {
            status: "error".to_string(),
            detail: Some(e),
        },
    };

    let healthy = incident_log.status == "ok";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            capture,
            incident_log,
        },
    };

    Json(response)
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    let state = state.read().await;
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Run the server until `shutdown` completes
pub async fn run_server(
    addr: &str,
    state: Arc<RwLock<AppState>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state);

    info!("Starting status server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
