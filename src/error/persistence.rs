// Persistence error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Persistence error code constants
///
/// Error code range: 5001-5005
pub struct PersistenceErrorCodes {}

impl PersistenceErrorCodes {
    pub const IO: i32 = 5001;
    pub const FORMAT: i32 = 5002;
    pub const SAMPLE_COUNT_MISMATCH: i32 = 5003;
    pub const DIMENSION_MISMATCH: i32 = 5004;
    pub const INVALID_CONTENT: i32 = 5005;
}

/// Log a persistence error with structured context
pub fn log_persistence_error(err: &PersistenceError, context: &str) {
    error!(
        "Persistence error in {}: code={}, component=PersistenceAdapter, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Save/load failures
///
/// A load that fails any of these checks is rejected wholesale; nothing is
/// applied to the in-memory state.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Reading or writing the file failed
    Io { path: String, details: String },

    /// File contents are not a valid dataset document
    Format { path: String, details: String },

    /// Dataset holds a different number of samples than expected
    SampleCountMismatch { expected: usize, actual: usize },

    /// Dataset dimensionality differs from the active stream
    DimensionMismatch { expected: usize, actual: usize },

    /// Dataset is well-formed JSON but internally inconsistent
    InvalidContent { reason: String },
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> i32 {
        match self {
            PersistenceError::Io { .. } => PersistenceErrorCodes::IO,
            PersistenceError::Format { .. } => PersistenceErrorCodes::FORMAT,
            PersistenceError::SampleCountMismatch { .. } => {
                PersistenceErrorCodes::SAMPLE_COUNT_MISMATCH
            }
            PersistenceError::DimensionMismatch { .. } => {
                PersistenceErrorCodes::DIMENSION_MISMATCH
            }
            PersistenceError::InvalidContent { .. } => PersistenceErrorCodes::INVALID_CONTENT,
        }
    }

    fn message(&self) -> String {
        match self {
            PersistenceError::Io { path, details } => {
                format!("I/O error on {}: {}", path, details)
            }
            PersistenceError::Format { path, details } => {
                format!("Malformed data in {}: {}", path, details)
            }
            PersistenceError::SampleCountMismatch { expected, actual } => format!(
                "Number of samples in file ({}) differs from the expected {}",
                actual, expected
            ),
            PersistenceError::DimensionMismatch { expected, actual } => format!(
                "Number of dimensions in file ({}) differs from the expected {}",
                actual, expected
            ),
            PersistenceError::InvalidContent { reason } => {
                format!("Invalid dataset: {}", reason)
            }
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersistenceError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PersistenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_codes() {
        assert_eq!(
            PersistenceError::SampleCountMismatch {
                expected: 2,
                actual: 3
            }
            .code(),
            PersistenceErrorCodes::SAMPLE_COUNT_MISMATCH
        );
        assert_eq!(
            PersistenceError::InvalidContent {
                reason: "x".to_string()
            }
            .code(),
            PersistenceErrorCodes::INVALID_CONTENT
        );
    }

    #[test]
    fn test_persistence_error_messages() {
        let err = PersistenceError::DimensionMismatch {
            expected: 3,
            actual: 6,
        };
        assert_eq!(
            err.message(),
            "Number of dimensions in file (6) differs from the expected 3"
        );
    }
}
