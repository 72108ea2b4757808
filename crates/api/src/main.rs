//! Drowsiness Monitor - Main Entry Point

use alerting::AlarmController;
use anyhow::Context;
use api::{init_logging, run_server, AppConfig, AppState, Pipeline, PipelineOptions};
use camera_capture::ImageSequenceSource;
use clap::Parser;
use dms::DmsModule;
use std::path::PathBuf;
use std::sync::Arc;
use storage::IncidentLog;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

/// Webcam drowsiness detector with incident logging
#[derive(Debug, Parser)]
#[command(name = "drowsiness-monitor", version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of captured frames to analyze
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Face-mesh ONNX model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Incident log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run without the HTTP status server
    #[arg(long)]
    no_server: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(frames) = &self.frames {
            config.camera.frames_dir = frames.clone();
        }
        if let Some(model) = &self.model {
            config.dms.landmark_model_path = Some(model.clone());
        }
        if let Some(log_file) = &self.log_file {
            config.storage.incident_log = log_file.clone();
        }
        if self.no_server {
            config.server.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);

    init_logging(&config.logging).context("failed to initialize logging")?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = match api::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder unavailable: {}", e);
            None
        }
    };

    let source = ImageSequenceSource::new(&config.camera).context("failed to open frame source")?;
    let dms = DmsModule::new(config.dms.clone()).context("failed to initialize landmark detection")?;
    let alarm = AlarmController::from_config(config.alarm.clone()).context("failed to initialize alarm")?;
    let log = Arc::new(IncidentLog::new(&config.storage.incident_log));

    let options = PipelineOptions {
        mirror: config.camera.mirror,
        publish_frames: config.server.enabled && config.server.publish_frames,
        jpeg_quality: config.server.jpeg_quality,
        overlay: true,
    };
    let (pipeline, handle) = Pipeline::new(Box::new(source), dms, alarm, log.clone(), options);
    let mut capture = tokio::task::spawn_blocking(move || pipeline.run());

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = if config.server.enabled {
        let state = Arc::new(RwLock::new(AppState::new(log.clone(), handle.clone(), metrics)));
        let bind = config.server.bind.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            if let Err(e) = run_server(&bind, state, shutdown).await {
                error!("Status server on {} failed: {}", bind, e);
            }
        }))
    } else {
        None
    };

    let finished = tokio::select! {
        result = &mut capture => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let status = match finished {
        Some(result) => {
            let status = result.context("capture thread panicked")?;
            if server.is_some() {
                info!("Capture finished, serving status until Ctrl-C");
                tokio::signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;
            }
            status
        }
        None => {
            info!("Ctrl-C received, stopping capture");
            handle.request_stop();
            capture.await.context("capture thread panicked")?
        }
    };

    let _ = shutdown_tx.send(true);
    if let Some(server) = server {
        server.await.context("status server task panicked")?;
    }

    info!(
        "Session finished: {} frames, {} incidents, log at {}",
        status.frames_processed,
        status.incident_count,
        log.path().display()
    );
    Ok(())
}
