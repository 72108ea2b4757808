//! Storage Layer
//!
//! Persists drowsiness incidents as an appended JSON array on disk.

mod repository;

pub use repository::{IncidentLog, IncidentRecord};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Lock error: {0}")]
    Lock(String),
}
