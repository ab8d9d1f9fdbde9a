//! Error handling for the PPG recorder
//!
//! One error type for every fallible operation in the acquisition pipeline,
//! the session state machine and the exporter.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::SamplingStrategy;

/// Result type alias for PPG operations
pub type PpgResult<T> = Result<T, PpgError>;

/// Error type for all PPG recorder operations
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PpgError {
    /// Frame geometry or plane buffers are unusable
    #[error("Invalid frame: {reason}")]
    InvalidFrame {
        /// Description of the frame issue
        reason: String,
    },

    /// Cropped sampling region is too short to be divided into zones
    #[error("Degenerate sampling region: cropped height {height} rows, need at least {min_height}")]
    DegenerateRegion {
        /// Cropped region height in rows
        height: usize,
        /// Minimum height accepted
        min_height: usize,
    },

    /// Sample vector does not match the session's sampling strategy
    #[error("Sample arity mismatch: {strategy} expects {expected} values, got {got}")]
    ArityMismatch {
        /// Strategy the session is locked to
        strategy: SamplingStrategy,
        /// Values per frame for that strategy
        expected: usize,
        /// Values actually supplied
        got: usize,
    },

    /// Save attempted without a reference value
    #[error("Reference value is empty")]
    EmptyReferenceValue,

    /// Save attempted without any recorded samples
    #[error("Session has no recorded samples")]
    EmptySession,

    /// A save is already outstanding
    #[error("A save is already in progress")]
    SaveInProgress,

    /// The storage layer failed to write the record
    #[error("Failed to write {}: {reason}", .path.display())]
    Storage {
        /// Target file path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Configuration rejected by validation
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration issue
        message: String,
    },

    /// Capture source could not be initialized
    #[error("Capture unavailable: {reason}")]
    CaptureUnavailable {
        /// Description of the capture failure
        reason: String,
    },

    /// A task on the other end of a channel has gone away
    #[error("Channel closed: {channel}")]
    ChannelClosed {
        /// Which channel closed
        channel: &'static str,
    },
}

impl PpgError {
    /// Convenience constructor for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        PpgError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Convenience constructor for storage errors
    pub fn storage(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        PpgError::Storage {
            path: path.into(),
            reason: source.to_string(),
        }
    }

    /// Whether the error is a user-input validation failure that leaves state unchanged
    pub fn is_validation(&self) -> bool {
        matches!(self, PpgError::EmptyReferenceValue | PpgError::EmptySession)
    }
}
