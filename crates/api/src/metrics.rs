//! Prometheus metrics

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const FRAMES_PROCESSED: &str = "drowsiness_frames_processed_total";
pub const CAPTURE_FAILURES: &str = "drowsiness_capture_failures_total";
pub const DETECTION_FAILURES: &str = "drowsiness_detection_failures_total";
pub const INCIDENTS: &str = "drowsiness_incidents_total";
pub const LOG_FAILURES: &str = "drowsiness_log_failures_total";
pub const EYE_ASPECT_RATIO: &str = "drowsiness_eye_aspect_ratio";
pub const DROWSY: &str = "drowsiness_drowsy";

/// Install the global Prometheus recorder
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    describe_counter!(FRAMES_PROCESSED, "Frames analyzed by the capture loop");
    describe_counter!(CAPTURE_FAILURES, "Frames that could not be read");
    describe_counter!(DETECTION_FAILURES, "Frames where landmark detection failed");
    describe_counter!(INCIDENTS, "Drowsiness incidents started");
    describe_counter!(LOG_FAILURES, "Incidents that could not be written to the log");
    describe_gauge!(EYE_ASPECT_RATIO, "Mean eye aspect ratio of the last frame with a face");
    describe_gauge!(DROWSY, "1 while a drowsiness incident is open");
}
