// Input stream and sample hand-off error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Stream error code constants
///
/// Error code range: 1001-1004
pub struct StreamErrorCodes {}

impl StreamErrorCodes {
    /// Input stream or output sink refused to start
    pub const START_FAILED: i32 = 1001;

    /// Input stream has not been started
    pub const NOT_STARTED: i32 = 1002;

    /// Batch width differs from the configured stream dimensionality
    pub const DIMENSION_MISMATCH: i32 = 1003;

    /// Sample buffer mutex was poisoned
    pub const LOCK_POISONED: i32 = 1004;
}

/// Log a stream error with structured context
pub fn log_stream_error(err: &StreamError, context: &str) {
    error!(
        "Stream error in {}: code={}, component=InputStream, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised at the producer/consumer boundary
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// A collaborator's `start()` reported failure
    StartFailed { reason: String },

    /// Operation requires a running input stream
    NotStarted,

    /// Row width does not match the stream's dimensionality
    DimensionMismatch { expected: usize, actual: usize },

    /// Mutex guarding the pending batch was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for StreamError {
    fn code(&self) -> i32 {
        match self {
            StreamError::StartFailed { .. } => StreamErrorCodes::START_FAILED,
            StreamError::NotStarted => StreamErrorCodes::NOT_STARTED,
            StreamError::DimensionMismatch { .. } => StreamErrorCodes::DIMENSION_MISMATCH,
            StreamError::LockPoisoned { .. } => StreamErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            StreamError::StartFailed { reason } => format!("Failed to start stream: {}", reason),
            StreamError::NotStarted => "Input stream not started".to_string(),
            StreamError::DimensionMismatch { expected, actual } => format!(
                "Stream dimensionality mismatch: expected {}, got {}",
                expected, actual
            ),
            StreamError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StreamError {}
