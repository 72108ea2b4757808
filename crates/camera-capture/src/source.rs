//! Frame sources
//!
//! The capture loop only sees the `FrameSource` trait. Live camera drivers
//! live outside this crate; the image sequence source replays recorded frames.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::frame::VideoFrame;
use crate::{CameraConfig, CameraError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A stream of decoded frames
pub trait FrameSource: Send {
    /// Read the next frame.
    ///
    /// `Ok(None)` means the stream has ended. An `Err` is a failed read of a
    /// single frame; callers may try again.
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Replays a directory of still images in file-name order
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    index: usize,
    sequence: u32,
    interval_ns: u64,
    loop_sequence: bool,
    realtime: bool,
    started: Option<Instant>,
}

impl ImageSequenceSource {
    /// Open the configured frames directory
    pub fn new(config: &CameraConfig) -> Result<Self, CameraError> {
        let files = list_images(&config.frames_dir)?;
        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "no images found in {}",
                config.frames_dir.display()
            )));
        }

        info!(
            "Replaying {} frames from {} at {} fps",
            files.len(),
            config.frames_dir.display(),
            config.fps
        );

        Ok(Self {
            files,
            index: 0,
            sequence: 0,
            interval_ns: config.frame_interval_ns(),
            loop_sequence: config.loop_sequence,
            realtime: config.realtime,
            started: None,
        })
    }

    /// Number of images in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self, timestamp_ns: u64) {
        if !self.realtime {
            return;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + Duration::from_nanos(timestamp_ns);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.index >= self.files.len() {
            if !self.loop_sequence {
                return Ok(None);
            }
            self.index = 0;
        }

        let path = self.files[self.index].clone();
        self.index += 1;
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        let timestamp_ns = u64::from(sequence) * self.interval_ns;

        let decoded = image::open(&path).map_err(|e| CameraError::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        });
        self.pace(timestamp_ns);

        let image = decoded?.to_rgb8();
        debug!("Frame {} decoded from {}", sequence, path.display());
        Ok(Some(VideoFrame::from_rgb_image(image, timestamp_ns, sequence)))
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frames(dir: &Path, count: usize) {
        for i in 0..count {
            let img = RgbImage::from_pixel(4, 3, Rgb([i as u8, 0, 0]));
            img.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
        }
    }

    fn config_for(dir: &Path) -> CameraConfig {
        CameraConfig {
            frames_dir: dir.to_path_buf(),
            fps: 10,
            realtime: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_replays_in_order_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::new(&config_for(dir.path())).unwrap();
        assert_eq!(source.len(), 3);

        for i in 0..3u32 {
            let frame = source.read_frame().unwrap().unwrap();
            assert_eq!(frame.sequence, i);
            assert_eq!(frame.timestamp_ns, u64::from(i) * 100_000_000);
            assert_eq!(frame.get_pixel(0, 0), Some([i as u8, 0, 0]));
        }
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_loop_keeps_timestamps_increasing() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        let config = CameraConfig {
            loop_sequence: true,
            ..config_for(dir.path())
        };

        let mut source = ImageSequenceSource::new(&config).unwrap();
        let stamps: Vec<u64> = (0..5)
            .map(|_| source.read_frame().unwrap().unwrap().timestamp_ns)
            .collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_corrupt_image_is_a_recoverable_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        write_frames(dir.path(), 2);

        let mut source = ImageSequenceSource::new(&config_for(dir.path())).unwrap();
        assert!(matches!(source.read_frame(), Err(CameraError::Decode { .. })));
        assert!(source.read_frame().unwrap().is_some());
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::new(&config_for(dir.path())),
            Err(CameraError::Open(_))
        ));
    }
}
