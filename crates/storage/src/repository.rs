//! Repository Implementation

use crate::StorageError;
use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use dms::Incident;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// One persisted drowsiness incident
///
/// Timestamps are local date-times without offset, in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    #[serde(with = "micros")]
    pub created_date_time: NaiveDateTime,
    #[serde(with = "micros")]
    pub incident_start_date_time: NaiveDateTime,
    #[serde(with = "micros")]
    pub incident_stop_date_time: NaiveDateTime,
    /// Rounded to two decimals
    pub incident_duration_in_seconds: f64,
}

impl IncidentRecord {
    pub fn from_incident(incident: &Incident, created: DateTime<Local>) -> Self {
        Self {
            created_date_time: created.naive_local().trunc_subsecs(6),
            incident_start_date_time: incident.started_at.naive_local().trunc_subsecs(6),
            incident_stop_date_time: incident.ended_at.naive_local().trunc_subsecs(6),
            incident_duration_in_seconds: round2(incident.duration_secs()),
        }
    }
}

/// ISO-8601 with exactly six fractional digits; reading accepts any precision
mod micros {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Incident log stored as a JSON array file
#[derive(Debug)]
pub struct IncidentLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl IncidentLog {
    /// Open (lazily) the log at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Using incident log {}", path.display());
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, oldest first. Missing or corrupt files read as empty.
    pub fn load(&self) -> Result<Vec<IncidentRecord>, StorageError> {
        let _guard = self.guard()?;
        self.read_records(false)
    }

    /// Append an incident and rewrite the file
    pub fn append(&self, incident: &Incident) -> Result<IncidentRecord, StorageError> {
        let record = IncidentRecord::from_incident(incident, Local::now());

        let _guard = self.guard()?;
        let mut records = self.read_records(true)?;
        records.push(record.clone());
        self.write_records(&records)?;

        info!("Drowsiness incident logged ({:.2}s)", record.incident_duration_in_seconds);
        Ok(record)
    }

    /// Newest records first
    pub fn recent(&self, limit: usize) -> Result<Vec<IncidentRecord>, StorageError> {
        Ok(self.load()?.into_iter().rev().take(limit).collect())
    }

    /// Total persisted incidents
    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.load()?.len())
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn read_records(&self, preserve_corrupt: bool) -> Result<Vec<IncidentRecord>, StorageError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Incident log {} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("Incident log {} is corrupt ({}), treating as empty", self.path.display(), e);
                if preserve_corrupt {
                    let backup = self.corrupt_backup_path();
                    std::fs::write(&backup, &raw).map_err(|e| self.io_error(e))?;
                    warn!("Corrupt incident log copied to {}", backup.display());
                }
                Ok(Vec::new())
            }
        }
    }

    fn write_records(&self, records: &[IncidentRecord]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        records
            .serialize(&mut serializer)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        std::fs::write(&self.path, buf).map_err(|e| self.io_error(e))
    }

    fn corrupt_backup_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    fn io_error(&self, e: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}
