//! Drowsiness state tracking
//!
//! Debounced two-state machine driven once per frame:
//! Awake -> Drowsy after continuous eye closure, Drowsy -> Awake after
//! continuous eye opening or as soon as the face is lost.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::DmsConfig;

/// Drowsiness level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrowsinessLevel {
    #[default]
    Awake,
    Drowsy,
}

/// What a single frame says about the eyes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeObservation {
    Open,
    Closed,
    FaceLost,
}

/// A completed drowsiness incident
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    /// When the eyes were first seen closed
    pub started_at: DateTime<Local>,
    /// When the incident was closed (recovery or face loss)
    pub ended_at: DateTime<Local>,
    pub duration: Duration,
}

impl Incident {
    fn close(started_at: DateTime<Local>, now: DateTime<Local>) -> Self {
        let ended_at = now.max(started_at);
        Self {
            started_at,
            ended_at,
            duration: elapsed(started_at, ended_at),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// State transitions reported to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    IncidentStarted {
        count: u32,
        started_at: DateTime<Local>,
    },
    IncidentEnded(Incident),
}

/// Detector state (tracked over time)
#[derive(Debug, Clone, Default)]
pub struct DetectorState {
    pub level: DrowsinessLevel,

    /// Start of the current run of closed-eye frames
    pub eyes_closed_since: Option<DateTime<Local>>,

    /// Start of the current run of open-eye frames
    pub eyes_open_since: Option<DateTime<Local>>,

    /// Start of the open incident, if any
    pub incident_started_at: Option<DateTime<Local>>,

    /// Incidents started since the monitor was created
    pub incident_count: u32,

    /// Duration of the open incident, or of the last one while awake
    pub current_duration: Duration,
}

impl DetectorState {
    pub fn is_drowsy(&self) -> bool {
        self.level == DrowsinessLevel::Drowsy
    }
}

/// Debounced drowsiness state machine
#[derive(Debug, Clone)]
pub struct DrowsinessMonitor {
    closed_threshold: Duration,
    open_threshold: Duration,
    state: DetectorState,
}

impl DrowsinessMonitor {
    pub fn new(config: &DmsConfig) -> Self {
        Self::with_thresholds(config.eyes_closed_threshold(), config.eyes_open_threshold())
    }

    pub fn with_thresholds(closed_threshold: Duration, open_threshold: Duration) -> Self {
        Self {
            closed_threshold,
            open_threshold,
            state: DetectorState::default(),
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Feed one frame's observation taken at `now`
    pub fn observe(&mut self, observation: EyeObservation, now: DateTime<Local>) -> Option<MonitorEvent> {
        let event = match observation {
            EyeObservation::Closed => {
                self.state.eyes_open_since = None;
                let since = *self.state.eyes_closed_since.get_or_insert(now);
                if !self.state.is_drowsy() && elapsed(since, now) >= self.closed_threshold {
                    Some(self.enter_drowsy(since))
                } else {
                    None
                }
            }
            EyeObservation::Open => {
                self.state.eyes_closed_since = None;
                let since = *self.state.eyes_open_since.get_or_insert(now);
                if self.state.is_drowsy() && elapsed(since, now) >= self.open_threshold {
                    self.leave_drowsy(now)
                } else {
                    None
                }
            }
            EyeObservation::FaceLost => {
                self.state.eyes_closed_since = None;
                self.state.eyes_open_since = None;
                self.leave_drowsy(now)
            }
        };

        if let Some(started_at) = self.state.incident_started_at {
            self.state.current_duration = elapsed(started_at, now);
        }

        event
    }

    /// Close any open incident, e.g. on shutdown
    pub fn finish(&mut self, now: DateTime<Local>) -> Option<Incident> {
        self.state.eyes_closed_since = None;
        self.state.eyes_open_since = None;
        match self.leave_drowsy(now) {
            Some(MonitorEvent::IncidentEnded(incident)) => Some(incident),
            _ => None,
        }
    }

    fn enter_drowsy(&mut self, since: DateTime<Local>) -> MonitorEvent {
        self.state.level = DrowsinessLevel::Drowsy;
        self.state.incident_started_at = Some(since);
        self.state.incident_count += 1;
        info!("Drowsiness incident #{} started", self.state.incident_count);
        MonitorEvent::IncidentStarted {
            count: self.state.incident_count,
            started_at: since,
        }
    }

    fn leave_drowsy(&mut self, now: DateTime<Local>) -> Option<MonitorEvent> {
        if !self.state.is_drowsy() {
            return None;
        }
        let started_at = self.state.incident_started_at.take()?;
        self.state.level = DrowsinessLevel::Awake;

        let incident = Incident::close(started_at, now);
        self.state.current_duration = incident.duration;
        debug!("Drowsiness incident ended after {:.2}s", incident.duration_secs());
        Some(MonitorEvent::IncidentEnded(incident))
    }
}

/// Time from `since` to `now`, zero if the clock went backwards
fn elapsed(since: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
