//! Error types for the tracking engine and its host layers.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Errors surfaced by the tracker, its configuration, and the stream host.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// A detection violated the engine's input contract. The frame carrying it
    /// is rejected as a whole and the store is left untouched.
    #[error("Invalid detection at index {index}: {reason}")]
    InvalidDetection { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tracking stream '{0}' is closed")]
    StreamClosed(String),

    #[error("Unknown tracking stream '{0}'")]
    UnknownStream(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    pub fn invalid_detection<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::InvalidDetection {
            index,
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
