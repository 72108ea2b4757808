//! Application configuration
//!
//! Layers an optional TOML file and `DROWSY__*` environment variables over
//! the defaults of every component.

use alerting::AlarmConfig;
use camera_capture::CameraConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_NAME: &str = "drowsiness-monitor";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub dms: DmsConfig,
    pub alarm: AlarmConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Incident log location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub incident_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            incident_log: PathBuf::from("drowsiness_log.json"),
        }
    }
}

/// Status server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
    /// Encode every processed frame for `/api/v1/frame`
    pub publish_frames: bool,
    pub jpeg_quality: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:8080".to_string(),
            publish_frames: true,
            jpeg_quality: 80,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration. An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("DROWSY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
