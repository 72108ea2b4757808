//! Alarm Controller Implementation

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::sink::{AlarmSink, CommandSink, LogSink};
use crate::AlertError;

/// Alarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Sound the alarm at all
    pub enabled: bool,
    /// Fade-out length when the driver recovers (default: 5000)
    pub fade_out_ms: u64,
    /// External player command; empty logs the alarm instead
    pub command: Vec<String>,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fade_out_ms: 5000,
            command: Vec::new(),
        }
    }
}

/// Playback state of the alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Sounding { since: Instant },
    FadingOut { until: Instant },
}

/// Starts and stops the alarm, tracking whether it is busy
pub struct AlarmController {
    config: AlarmConfig,
    sink: Box<dyn AlarmSink>,
    state: AlarmState,
    fire_count: usize,
}

impl AlarmController {
    /// Create a controller over an explicit sink
    pub fn new(config: AlarmConfig, sink: Box<dyn AlarmSink>) -> Self {
        info!("Creating alarm controller with config: {:?}", config);
        Self {
            config,
            sink,
            state: AlarmState::Idle,
            fire_count: 0,
        }
    }

    /// Pick the sink the configuration asks for
    pub fn from_config(config: AlarmConfig) -> Result<Self, AlertError> {
        let sink: Box<dyn AlarmSink> = if config.command.is_empty() {
            Box::new(LogSink::new())
        } else {
            Box::new(CommandSink::new(&config.command)?)
        };
        Ok(Self::new(config, sink))
    }

    /// Start the looped alarm. Returns whether playback was (re)started.
    pub fn start(&mut self) -> Result<bool, AlertError> {
        if !self.config.enabled {
            return Ok(false);
        }
        self.tick()?;

        match self.state {
            AlarmState::Sounding { .. } => {
                debug!("Alarm already sounding");
                return Ok(false);
            }
            AlarmState::FadingOut { .. } => self.sink.silence()?,
            AlarmState::Idle => {}
        }

        self.sink.play()?;
        self.state = AlarmState::Sounding {
            since: Instant::now(),
        };
        self.fire_count += 1;
        info!("Alarm started (count: {})", self.fire_count);
        Ok(true)
    }

    /// Fade the alarm out. Returns whether it was sounding.
    pub fn stop(&mut self) -> Result<bool, AlertError> {
        let AlarmState::Sounding { .. } = self.state else {
            return Ok(false);
        };

        let fade = Duration::from_millis(self.config.fade_out_ms);
        if fade.is_zero() {
            self.sink.silence()?;
            self.state = AlarmState::Idle;
        } else {
            self.sink.fade_out(fade)?;
            self.state = AlarmState::FadingOut {
                until: Instant::now() + fade,
            };
        }
        info!("Alarm stopped with fadeout");
        Ok(true)
    }

    /// Finish an elapsed fade-out
    pub fn tick(&mut self) -> Result<(), AlertError> {
        if let AlarmState::FadingOut { until } = self.state {
            if Instant::now() >= until {
                self.sink.silence()?;
                self.state = AlarmState::Idle;
            }
        }
        Ok(())
    }

    /// Silence everything right away
    pub fn shutdown(&mut self) -> Result<(), AlertError> {
        if self.state != AlarmState::Idle {
            self.sink.silence()?;
            self.state = AlarmState::Idle;
        }
        Ok(())
    }

    /// Whether the alarm is playing or still fading
    pub fn is_busy(&self) -> bool {
        match self.state {
            AlarmState::Idle => false,
            AlarmState::Sounding { .. } => true,
            AlarmState::FadingOut { until } => Instant::now() < until,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Number of times the alarm has been started
    pub fn fire_count(&self) -> usize {
        self.fire_count
    }
}

impl std::fmt::Debug for AlarmController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmController")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("fire_count", &self.fire_count)
            .finish()
    }
}

impl Default for AlarmController {
    fn default() -> Self {
        Self::new(AlarmConfig::default(), Box::new(LogSink::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Sink that records every call
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<&'static str>>>);

    impl Recorder {
        fn calls(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    impl AlarmSink for Recorder {
        fn play(&mut self) -> Result<(), AlertError> {
            self.0.lock().unwrap().push("play");
            Ok(())
        }
        fn fade_out(&mut self, _fade: Duration) -> Result<(), AlertError> {
            self.0.lock().unwrap().push("fade");
            Ok(())
        }
        fn silence(&mut self) -> Result<(), AlertError> {
            self.0.lock().unwrap().push("silence");
            Ok(())
        }
    }

    fn controller(fade_out_ms: u64) -> (AlarmController, Recorder) {
        let recorder = Recorder::default();
        let config = AlarmConfig {
            fade_out_ms,
            ..Default::default()
        };
        (AlarmController::new(config, Box::new(recorder.clone())), recorder)
    }

    #[test]
    fn test_start_is_idempotent_while_sounding() {
        let (mut alarm, recorder) = controller(5000);
        assert!(alarm.start().unwrap());
        assert!(!alarm.start().unwrap());
        assert_eq!(recorder.calls(), vec!["play"]);
        assert_eq!(alarm.fire_count(), 1);
        assert!(alarm.is_busy());
    }

    #[test]
    fn test_stop_fades_out() {
        let (mut alarm, recorder) = controller(5000);
        assert!(!alarm.stop().unwrap());

        alarm.start().unwrap();
        assert!(alarm.stop().unwrap());
        assert!(matches!(alarm.state(), AlarmState::FadingOut { .. }));
        assert!(alarm.is_busy());
        // still fading: nothing to finish yet
        alarm.tick().unwrap();
        assert_eq!(recorder.calls(), vec!["play", "fade"]);
    }

    #[test]
    fn test_restart_during_fade() {
        let (mut alarm, recorder) = controller(5000);
        alarm.start().unwrap();
        alarm.stop().unwrap();
        assert!(alarm.start().unwrap());
        assert_eq!(recorder.calls(), vec!["play", "fade", "silence", "play"]);
        assert_eq!(alarm.fire_count(), 2);
    }

    #[test]
    fn test_zero_fade_silences_immediately() {
        let (mut alarm, recorder) = controller(0);
        alarm.start().unwrap();
        alarm.stop().unwrap();
        assert_eq!(alarm.state(), AlarmState::Idle);
        assert!(!alarm.is_busy());
        assert_eq!(recorder.calls(), vec!["play", "silence"]);
    }

    #[test]
    fn test_elapsed_fade_returns_to_idle() {
        let (mut alarm, recorder) = controller(1);
        alarm.start().unwrap();
        alarm.stop().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        alarm.tick().unwrap();
        assert_eq!(alarm.state(), AlarmState::Idle);
        assert_eq!(recorder.calls(), vec!["play", "fade", "silence"]);
    }

    #[test]
    fn test_disabled_alarm_never_plays() {
        let recorder = Recorder::default();
        let config = AlarmConfig {
            enabled: false,
            ..Default::default()
        };
        let mut alarm = AlarmController::new(config, Box::new(recorder.clone()));
        assert!(!alarm.start().unwrap());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_shutdown() {
        let (mut alarm, recorder) = controller(5000);
        alarm.shutdown().unwrap();
        alarm.start().unwrap();
        alarm.shutdown().unwrap();
        assert_eq!(alarm.state(), AlarmState::Idle);
        assert_eq!(recorder.calls(), vec!["play", "silence"]);
    }

    #[test]
    fn test_from_config_picks_sink() {
        assert!(AlarmController::from_config(AlarmConfig::default()).is_ok());
        let config = AlarmConfig {
            command: vec!["mpg123".into(), "--loop".into(), "-1".into(), "alarm.mp3".into()],
            ..Default::default()
        };
        assert!(AlarmController::from_config(config).is_ok());
    }
}
