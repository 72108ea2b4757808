//! Status snapshot published after every frame

use chrono::{DateTime, Local};
use dms::{DmsAnalysis, DrowsinessLevel};
use serde::Serialize;

/// What the status surface shows about the running monitor
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatus {
    /// Capture loop still running
    pub running: bool,
    pub drowsiness_level: DrowsinessLevel,
    pub incident_count: u32,
    /// Current (or last) incident duration in seconds
    pub drowsiness_duration_secs: f64,
    pub face_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ear: Option<f32>,
    pub eyes_closed: bool,
    pub alarm_active: bool,
    pub overlay_enabled: bool,
    pub frames_processed: u64,
    pub capture_failures: u64,
    pub detection_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_at: Option<DateTime<Local>>,
}

impl MonitorStatus {
    /// Fold one frame's analysis into the snapshot
    pub fn apply(&mut self, analysis: &DmsAnalysis, at: DateTime<Local>) {
        self.drowsiness_level = analysis.drowsiness_level;
        self.incident_count = analysis.incident_count;
        self.drowsiness_duration_secs = analysis.drowsiness_duration_secs;
        self.face_detected = analysis.face_detected;
        self.ear = analysis.ear;
        self.eyes_closed = analysis.eyes_closed;
        self.frames_processed += 1;
        self.last_frame_at = Some(at);
    }
}
