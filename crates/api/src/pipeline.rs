//! Capture loop
//!
//! Pulls frames, runs the DMS analysis, drives the alarm, logs incidents and
//! publishes status snapshots. Runs on a blocking thread; it is the only
//! writer of monitor state.

use alerting::AlarmController;
use camera_capture::{FrameSource, VideoFrame};
use chrono::{DateTime, Local};
use dms::{DmsAnalysis, DmsModule, Incident, MonitorEvent};
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use storage::IncidentLog;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::metrics as m;
use crate::overlay;
use crate::status::MonitorStatus;

/// Latest encoded frame (JPEG)
pub type FrameBytes = Option<Arc<Vec<u8>>>;

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Mirror frames before analysis
    pub mirror: bool,
    /// Encode frames for the status surface
    pub publish_frames: bool,
    pub jpeg_quality: u8,
    /// Draw landmarks on published frames at start
    pub overlay: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            publish_frames: true,
            jpeg_quality: 80,
            overlay: true,
        }
    }
}

/// Everything outside the capture thread needs
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    pub status: watch::Receiver<MonitorStatus>,
    pub frame: watch::Receiver<FrameBytes>,
    /// Landmark visualization toggle
    pub overlay: Arc<AtomicBool>,
    /// Raise to stop the capture loop
    pub stop: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// Flip landmark visualization, returning the new value
    pub fn toggle_overlay(&self) -> bool {
        !self.overlay.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Single-threaded capture and analysis loop
pub struct Pipeline {
    source: Box<dyn FrameSource>,
    dms: DmsModule,
    alarm: AlarmController,
    log: Arc<IncidentLog>,
    options: PipelineOptions,
    overlay: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    status_tx: watch::Sender<MonitorStatus>,
    frame_tx: watch::Sender<FrameBytes>,
    session_start: DateTime<Local>,
    status: MonitorStatus,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn FrameSource>,
        dms: DmsModule,
        alarm: AlarmController,
        log: Arc<IncidentLog>,
        options: PipelineOptions,
    ) -> (Self, MonitorHandle) {
        let status = MonitorStatus {
            overlay_enabled: options.overlay,
            ..Default::default()
        };
        let (status_tx, status_rx) = watch::channel(status.clone());
        let (frame_tx, frame_rx) = watch::channel(None);
        let overlay = Arc::new(AtomicBool::new(options.overlay));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = MonitorHandle {
            status: status_rx,
            frame: frame_rx,
            overlay: overlay.clone(),
            stop: stop.clone(),
        };

        let pipeline = Self {
            source,
            dms,
            alarm,
            log,
            options,
            overlay,
            stop,
            status_tx,
            frame_tx,
            session_start: Local::now(),
            status,
        };
        (pipeline, handle)
    }

    /// Run until stopped or the source ends; returns the final status
    pub fn run(mut self) -> MonitorStatus {
        info!("Capture loop started");
        self.status.running = true;
        self.publish();

        while !self.stop.load(Ordering::SeqCst) {
            match self.source.read_frame() {
                Ok(Some(frame)) => self.process_frame(frame),
                Ok(None) => {
                    info!("Frame source ended");
                    break;
                }
                Err(e) => {
                    warn!("Ignoring empty camera frame: {}", e);
                    counter!(m::CAPTURE_FAILURES).increment(1);
                    self.status.capture_failures += 1;
                    self.publish();
                }
            }
        }

        self.shutdown();
        self.status
    }

    fn frame_time(&self, frame: &VideoFrame) -> DateTime<Local> {
        let offset = i64::try_from(frame.timestamp_ns).unwrap_or(i64::MAX);
        self.session_start + chrono::Duration::nanoseconds(offset)
    }

    fn process_frame(&mut self, mut frame: VideoFrame) {
        if self.options.mirror {
            frame.flip_horizontal();
        }
        let now = self.frame_time(&frame);

        if let Err(e) = self.alarm.tick() {
            warn!("Alarm fade-out failed: {}", e);
        }

        let analysis = match self.dms.analyze(&frame, now) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Detection failed on frame {}: {}", frame.sequence, e);
                counter!(m::DETECTION_FAILURES).increment(1);
                self.status.detection_failures += 1;
                self.publish();
                return;
            }
        };

        match &analysis.event {
            Some(MonitorEvent::IncidentStarted { count, .. }) => {
                counter!(m::INCIDENTS).increment(1);
                debug!("Incident {} raised alarm", count);
                if let Err(e) = self.alarm.start() {
                    error!("Failed to start alarm: {}", e);
                }
            }
            Some(MonitorEvent::IncidentEnded(incident)) => {
                if let Err(e) = self.alarm.stop() {
                    error!("Failed to stop alarm: {}", e);
                }
                self.record(incident);
            }
            None => {}
        }

        counter!(m::FRAMES_PROCESSED).increment(1);
        if let Some(ear) = analysis.ear {
            gauge!(m::EYE_ASPECT_RATIO).set(f64::from(ear));
        }
        gauge!(m::DROWSY).set(if self.dms.state().is_drowsy() { 1.0 } else { 0.0 });

        self.status.apply(&analysis, now);
        self.publish_frame(&frame, &analysis);
        self.publish();
    }

    fn record(&self, incident: &Incident) {
        if let Err(e) = self.log.append(incident) {
            counter!(m::LOG_FAILURES).increment(1);
            error!("Failed to log incident: {}", e);
        }
    }

    fn publish_frame(&self, frame: &VideoFrame, analysis: &DmsAnalysis) {
        if !self.options.publish_frames {
            return;
        }
        let landmarks = if self.overlay.load(Ordering::Relaxed) {
            analysis.landmarks.as_ref()
        } else {
            None
        };
        let Some(img) = overlay::render(frame, landmarks) else {
            debug!("Frame {} has inconsistent size, not published", frame.sequence);
            return;
        };
        match overlay::encode_jpeg(&img, self.options.jpeg_quality) {
            Ok(jpeg) => {
                self.frame_tx.send_replace(Some(Arc::new(jpeg)));
            }
            Err(e) => debug!("JPEG encoding failed: {}", e),
        }
    }

    fn publish(&mut self) {
        self.status.alarm_active = self.alarm.is_busy();
        self.status.overlay_enabled = self.overlay.load(Ordering::Relaxed);
        self.status_tx.send_replace(self.status.clone());
    }

    fn shutdown(&mut self) {
        let now = self.status.last_frame_at.unwrap_or_else(Local::now);
        if let Some(incident) = self.dms.finish(now) {
            info!("Closing open incident on shutdown");
            self.record(&incident);
            self.status.drowsiness_level = self.dms.state().level;
            self.status.drowsiness_duration_secs = incident.duration_secs();
        }
        if let Err(e) = self.alarm.shutdown() {
            warn!("Failed to silence alarm: {}", e);
        }
        self.status.running = false;
        self.publish();
        info!(
            "Capture loop stopped after {} frames, {} incidents",
            self.status.frames_processed, self.status.incident_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::{AlarmConfig, AlarmState};
    use camera_capture::CameraError;
    use dms::landmarks::{LEFT_EYE, RIGHT_EYE};
    use dms::{DmsConfig, DmsError, DrowsinessLevel, FaceLandmarks, Landmark, LandmarkDetector};
    use std::collections::VecDeque;

    const FRAME_NS: u64 = 500_000_000;

    /// 2x2 frames every 500ms; `false` entries are read failures
    struct ScriptedSource {
        script: VecDeque<bool>,
        sequence: u32,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            let Some(ok) = self.script.pop_front() else {
                return Ok(None);
            };
            let sequence = self.sequence;
            self.sequence += 1;
            if !ok {
                return Err(CameraError::Stream("dropped".into()));
            }
            let ts = u64::from(sequence) * FRAME_NS;
            Ok(Some(VideoFrame::new(vec![0; 12], 2, 2, ts, sequence)))
        }
    }

    /// EAR per frame; `None` means no face
    struct ScriptedDetector {
        script: VecDeque<Option<f32>>,
    }

    impl LandmarkDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceLandmarks>, DmsError> {
            Ok(self.script.pop_front().flatten().map(face))
        }
    }

    fn face(ear: f32) -> FaceLandmarks {
        let mut points = vec![Landmark::new(0.5, 0.5); 468];
        let half = ear * 0.05;
        for (indices, cx) in [(&LEFT_EYE, 0.65f32), (&RIGHT_EYE, 0.35f32)] {
            let eye = [
                Landmark::new(cx - 0.05, 0.5),
                Landmark::new(cx - 0.02, 0.5 - half),
                Landmark::new(cx + 0.02, 0.5 - half),
                Landmark::new(cx + 0.05, 0.5),
                Landmark::new(cx + 0.02, 0.5 + half),
                Landmark::new(cx - 0.02, 0.5 + half),
            ];
            for (&idx, point) in indices.iter().zip(eye) {
                points[idx] = point;
            }
        }
        FaceLandmarks::new(points, 1.0)
    }

    fn pipeline(
        frames: Vec<bool>,
        ears: Vec<Option<f32>>,
        log: Arc<IncidentLog>,
    ) -> (Pipeline, MonitorHandle) {
        let source = ScriptedSource {
            script: frames.into(),
            sequence: 0,
        };
        let detector = ScriptedDetector {
            script: ears.into(),
        };
        let dms = DmsModule::with_detector(DmsConfig::default(), Box::new(detector));
        let alarm = AlarmController::from_config(AlarmConfig::default()).unwrap();
        Pipeline::new(Box::new(source), dms, alarm, log, PipelineOptions::default())
    }

    fn temp_log() -> (tempfile::TempDir, Arc<IncidentLog>) {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(IncidentLog::new(dir.path().join("log.json")));
        (dir, log)
    }

    #[test]
    fn test_closure_then_recovery_logs_one_incident() {
        let (_dir, log) = temp_log();
        // 8 closed frames (3.5s), 8 open frames (3.5s)
        let ears = [vec![Some(0.1); 8], vec![Some(0.35); 8]].concat();
        let (pipeline, handle) = pipeline(vec![true; 16], ears, log.clone());

        let status = pipeline.run();
        assert!(!status.running);
        assert_eq!(status.frames_processed, 16);
        assert_eq!(status.incident_count, 1);
        assert_eq!(status.drowsiness_level, DrowsinessLevel::Awake);
        assert!(!status.alarm_active);

        let records = log.load().unwrap();
        assert_eq!(records.len(), 1);
        // first closure at 0s, eyes open from 4s, recovery confirmed at 7s
        assert_eq!(records[0].incident_duration_in_seconds, 7.0);

        let published = handle.status.borrow().clone();
        assert_eq!(published.incident_count, 1);
        assert!(handle.frame.borrow().is_some());
    }

    #[test]
    fn test_read_failures_are_skipped() {
        let (_dir, log) = temp_log();
        let frames = vec![true, false, false, true, true];
        let (pipeline, _handle) = pipeline(frames, vec![Some(0.3); 3], log);

        let status = pipeline.run();
        assert_eq!(status.capture_failures, 2);
        assert_eq!(status.frames_processed, 3);
    }

    #[test]
    fn test_open_incident_closed_on_shutdown() {
        let (_dir, log) = temp_log();
        let (pipeline, _handle) = pipeline(vec![true; 8], vec![Some(0.1); 8], log.clone());

        let status = pipeline.run();
        assert_eq!(status.incident_count, 1);
        assert_eq!(status.drowsiness_level, DrowsinessLevel::Awake);
        assert!(!status.alarm_active);
        let records = log.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].incident_duration_in_seconds, 3.5);
    }

    #[test]
    fn test_face_loss_ends_incident() {
        let (_dir, log) = temp_log();
        let ears = [vec![Some(0.1); 7], vec![None]].concat();
        let (pipeline, _handle) = pipeline(vec![true; 8], ears, log.clone());

        let status = pipeline.run();
        assert!(!status.face_detected);
        let records = log.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].incident_duration_in_seconds, 3.5);
    }

    #[test]
    fn test_stop_flag_halts_loop() {
        let (_dir, log) = temp_log();
        let (pipeline, handle) = pipeline(vec![true; 100], vec![Some(0.3); 100], log);
        handle.request_stop();
        let status = pipeline.run();
        assert_eq!(status.frames_processed, 0);
    }

    #[test]
    fn test_overlay_toggle() {
        let (_dir, log) = temp_log();
        let (_pipeline, handle) = pipeline(vec![], vec![], log);
        assert!(handle.overlay.load(Ordering::SeqCst));
        assert!(!handle.toggle_overlay());
        assert!(handle.toggle_overlay());
    }

    #[test]
    fn test_alarm_follows_incident() {
        let (_dir, log) = temp_log();
        let (mut pipeline, _handle) = pipeline(vec![], vec![Some(0.1); 7], log);
        for seq in 0..7u32 {
            let frame = VideoFrame::new(vec![0; 12], 2, 2, u64::from(seq) * FRAME_NS, seq);
            pipeline.process_frame(frame);
        }
        assert!(matches!(pipeline.alarm.state(), AlarmState::Sounding { .. }));
        assert!(pipeline.status.alarm_active);
    }
}
