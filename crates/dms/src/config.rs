//! DMS configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Average EAR below which the eyes count as closed
    pub ear_threshold: f32,

    /// Continuous eye closure before an incident starts (milliseconds)
    pub eyes_closed_threshold_ms: u64,

    /// Continuous eye opening before an incident ends (milliseconds)
    pub eyes_open_threshold_ms: u64,

    /// Minimum face-presence probability for a landmark set to count
    pub face_presence_threshold: f32,

    /// Side length of the square landmark model input
    pub model_input_size: u32,

    /// Face-mesh ONNX model path
    pub landmark_model_path: Option<PathBuf>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            eyes_closed_threshold_ms: 3000,
            eyes_open_threshold_ms: 3000,
            face_presence_threshold: 0.5,
            model_input_size: 192,
            landmark_model_path: None,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alerts sooner)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.27,
            eyes_closed_threshold_ms: 2000,
            ..Default::default()
        }
    }

    /// Create lenient config (alerts later)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.22,
            eyes_closed_threshold_ms: 4000,
            ..Default::default()
        }
    }

    pub fn eyes_closed_threshold(&self) -> Duration {
        Duration::from_millis(self.eyes_closed_threshold_ms)
    }

    pub fn eyes_open_threshold(&self) -> Duration {
        Duration::from_millis(self.eyes_open_threshold_ms)
    }

    /// Reject values the state machine cannot work with
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(self.ear_threshold > 0.0 && self.ear_threshold < 1.0) {
            return Err(DmsError::Config(format!(
                "ear_threshold must be in (0, 1), got {}",
                self.ear_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.face_presence_threshold) {
            return Err(DmsError::Config(format!(
                "face_presence_threshold must be in [0, 1], got {}",
                self.face_presence_threshold
            )));
        }
        if self.model_input_size == 0 {
            return Err(DmsError::Config("model_input_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_three_second_debounce() {
        let config = DmsConfig::default();
        assert_eq!(config.eyes_closed_threshold(), Duration::from_secs(3));
        assert_eq!(config.eyes_open_threshold(), Duration::from_secs(3));
        assert!((config.ear_threshold - 0.25).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_ordered() {
        assert!(DmsConfig::strict().eyes_closed_threshold_ms < DmsConfig::default().eyes_closed_threshold_ms);
        assert!(DmsConfig::lenient().eyes_closed_threshold_ms > DmsConfig::default().eyes_closed_threshold_ms);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = DmsConfig {
            ear_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }
}
