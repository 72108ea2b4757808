//! Per-frame analysis results

use serde::{Deserialize, Serialize};

use crate::landmarks::FaceLandmarks;
use crate::state::{DrowsinessLevel, Incident, MonitorEvent};

/// Complete DMS analysis of one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Landmarks of the detected face
    #[serde(skip)]
    pub landmarks: Option<FaceLandmarks>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_ear: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_ear: Option<f32>,

    /// Mean EAR of both eyes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ear: Option<f32>,

    /// Whether the mean EAR was below the threshold
    pub eyes_closed: bool,

    /// Drowsiness level after this frame
    pub drowsiness_level: DrowsinessLevel,

    /// Incidents started so far
    pub incident_count: u32,

    /// Current (or last) incident duration in seconds
    pub drowsiness_duration_secs: f64,

    /// Transition caused by this frame
    #[serde(skip)]
    pub event: Option<MonitorEvent>,
}

impl DmsAnalysis {
    /// Check if this frame started an incident
    pub fn started_incident(&self) -> bool {
        matches!(self.event, Some(MonitorEvent::IncidentStarted { .. }))
    }

    /// Incident closed by this frame, if any
    pub fn ended_incident(&self) -> Option<&Incident> {
        match &self.event {
            Some(MonitorEvent::IncidentEnded(incident)) => Some(incident),
            _ => None,
        }
    }
}
