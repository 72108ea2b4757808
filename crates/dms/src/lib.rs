//! Drowsiness Monitoring System (DMS)
//!
//! Per-frame driver state analysis:
//! - Facial landmark detection (external face-mesh model)
//! - Eye aspect ratio (EAR) from eye landmarks
//! - Debounced awake/drowsy state with incident timing

pub mod analysis;
pub mod config;
pub mod detector;
pub mod landmarks;
pub mod state;

pub use analysis::DmsAnalysis;
pub use config::DmsConfig;
pub use detector::{FaceMeshDetector, LandmarkDetector};
pub use landmarks::{FaceLandmarks, Landmark};
pub use state::{
    DetectorState, DrowsinessLevel, DrowsinessMonitor, EyeObservation, Incident, MonitorEvent,
};

use camera_capture::frame::VideoFrame;
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::trace;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Landmark output missing from model")]
    KeypointsMissing,
}

/// Drowsiness monitoring module
pub struct DmsModule {
    config: DmsConfig,
    detector: Box<dyn LandmarkDetector>,
    monitor: DrowsinessMonitor,
}

impl DmsModule {
    /// Create a module backed by the configured face-mesh model
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        let detector = FaceMeshDetector::new(&config)?;
        Ok(Self::with_detector(config, Box::new(detector)))
    }

    /// Create a module around any landmark detector
    pub fn with_detector(config: DmsConfig, detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            monitor: DrowsinessMonitor::new(&config),
            detector,
            config,
        }
    }

    /// Analyze a single frame captured at `now`
    pub fn analyze(&mut self, frame: &VideoFrame, now: DateTime<Local>) -> Result<DmsAnalysis, DmsError> {
        let Some(face) = self.detector.detect(frame)? else {
            let event = self.monitor.observe(EyeObservation::FaceLost, now);
            return Ok(self.snapshot(None, event));
        };

        let left_ear = face.left_ear();
        let right_ear = face.right_ear();
        let ear = face.average_ear();
        // A frame without a usable EAR never extends a closure
        let eyes_closed = ear.is_some_and(|e| e < self.config.ear_threshold);
        trace!("Frame {} EAR {:?}", frame.sequence, ear);

        let observation = if eyes_closed {
            EyeObservation::Closed
        } else {
            EyeObservation::Open
        };
        let event = self.monitor.observe(observation, now);

        let mut analysis = self.snapshot(Some(face), event);
        analysis.left_ear = left_ear;
        analysis.right_ear = right_ear;
        analysis.ear = ear;
        analysis.eyes_closed = eyes_closed;
        Ok(analysis)
    }

    fn snapshot(&self, face: Option<FaceLandmarks>, event: Option<MonitorEvent>) -> DmsAnalysis {
        let state = self.monitor.state();
        DmsAnalysis {
            face_detected: face.is_some(),
            landmarks: face,
            drowsiness_level: state.level,
            incident_count: state.incident_count,
            drowsiness_duration_secs: state.current_duration.as_secs_f64(),
            event,
            ..Default::default()
        }
    }

    /// Close any open incident (capture stopping)
    pub fn finish(&mut self, now: DateTime<Local>) -> Option<Incident> {
        self.monitor.finish(now)
    }

    pub fn state(&self) -> &DetectorState {
        self.monitor.state()
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Reset tracked state (new session)
    pub fn reset_state(&mut self) {
        self.monitor = DrowsinessMonitor::new(&self.config);
    }
}
