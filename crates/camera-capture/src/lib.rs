//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides the video frame type shared by the detection pipeline and the
//! `FrameSource` seam that live camera drivers plug into.
//! Supports:
//! - Replaying a directory of still images as a paced frame stream
//! - Mirroring frames for a selfie-style view

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ImageSequenceSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory holding the image sequence to replay
    pub frames_dir: PathBuf,
    /// Target FPS (also used to timestamp replayed frames)
    pub fps: u32,
    /// Mirror frames horizontally before analysis
    pub mirror: bool,
    /// Restart the sequence when it runs out
    pub loop_sequence: bool,
    /// Sleep between frames so replay runs at `fps`
    pub realtime: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            fps: 15,
            mirror: true,
            loop_sequence: false,
            realtime: true,
        }
    }
}

impl CameraConfig {
    /// Nanoseconds between two frames at the configured rate
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }
}
