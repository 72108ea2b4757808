//! Alarm output backends

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::AlertError;

/// Something that can sound the alarm
pub trait AlarmSink: Send {
    /// Start looped playback
    fn play(&mut self) -> Result<(), AlertError>;

    /// Begin fading out over `fade`
    fn fade_out(&mut self, fade: Duration) -> Result<(), AlertError>;

    /// Stop immediately (fade finished or shutdown)
    fn silence(&mut self) -> Result<(), AlertError>;
}

/// Alarm that only writes to the log
#[derive(Debug, Default)]
pub struct LogSink {
    plays: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times playback was started
    pub fn plays(&self) -> usize {
        self.plays
    }
}

impl AlarmSink for LogSink {
    fn play(&mut self) -> Result<(), AlertError> {
        self.plays += 1;
        warn!("ALARM: drowsiness detected");
        Ok(())
    }

    fn fade_out(&mut self, fade: Duration) -> Result<(), AlertError> {
        info!("Alarm fading out over {}ms", fade.as_millis());
        Ok(())
    }

    fn silence(&mut self) -> Result<(), AlertError> {
        debug!("Alarm silenced");
        Ok(())
    }
}

/// Alarm played by an external audio player process
///
/// The command is expected to loop the sound itself, e.g.
/// `mpg123 --loop -1 alarm.mp3`. The process is killed when the fade ends.
#[derive(Debug)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl CommandSink {
    pub fn new(command: &[String]) -> Result<Self, AlertError> {
        let (program, args) = command.split_first().ok_or(AlertError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            child: None,
        })
    }

    /// Whether the player process is still alive
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                self.child = None;
                false
            }
            None => false,
        }
    }
}

impl AlarmSink for CommandSink {
    fn play(&mut self) -> Result<(), AlertError> {
        if self.is_running() {
            return Ok(());
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AlertError::Spawn(format!("{}: {}", self.program, e)))?;
        info!("Alarm player started (pid {})", child.id());
        self.child = Some(child);
        Ok(())
    }

    fn fade_out(&mut self, fade: Duration) -> Result<(), AlertError> {
        debug!("Alarm player stops in {}ms", fade.as_millis());
        Ok(())
    }

    fn silence(&mut self) -> Result<(), AlertError> {
        if let Some(mut child) = self.child.take() {
            // already exited is fine
            if let Err(e) = child.kill() {
                debug!("Alarm player kill: {}", e);
            }
            child.wait().map_err(|e| AlertError::Stop(e.to_string()))?;
            info!("Alarm player stopped");
        }
        Ok(())
    }
}

impl Drop for CommandSink {
    fn drop(&mut self) {
        let _ = self.silence();
    }
}
