//! Core error types for quietalarm-core.
//!
//! Almost every failure in the engine is recoverable: a malformed day token
//! is skipped, a missing exact-wake capability falls back to a weaker timer
//! mode, a missing tone falls back to the platform default. The types here
//! describe those failures so the recovery sites can log them precisely.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for quietalarm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A thread panicked while holding the connection
    #[error("Database connection poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Out of range numeric input
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },}

/// Errors reported by a [`WakeTimer`](crate::alarm::WakeTimer).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The platform refuses the idle-waking exact alarm primitive.
    #[error("exact wake-from-idle alarms are unavailable on this platform")]
    ExactWakeUnavailable,
}

/// Errors reported by an [`AlarmSound`](crate::alarm::AlarmSound).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The requested tone asset does not exist.
    #[error("alarm tone '{0}' not found")]
    MissingResource(String),

    /// The audio backend failed to start playback.
    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// Errors surfaced through the method-call boundary.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Unknown method name.
    #[error("method '{0}' not implemented")]
    NotImplemented(String),

    /// A required argument is missing or has the wrong type.
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// The engine failed while serving the call.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
