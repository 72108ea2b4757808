//! Alerting System
//!
//! Drives the audible drowsiness alarm: looped playback while drowsy and a
//! fade-out once the driver recovers.

mod manager;
mod sink;

pub use manager::{AlarmConfig, AlarmController, AlarmState};
pub use sink::{AlarmSink, CommandSink, LogSink};

use thiserror::Error;

/// Alarm errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alarm command is empty")]
    EmptyCommand,
    #[error("Failed to start alarm player: {0}")]
    Spawn(String),
    #[error("Failed to stop alarm player: {0}")]
    Stop(String),
}
