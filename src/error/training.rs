// Training data and training run error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Training error code constants
///
/// Error code range: 4001-4011
pub struct TrainingErrorCodes {}

impl TrainingErrorCodes {
    /// Label outside 1..=max_labels
    pub const INVALID_LABEL: i32 = 4001;

    /// Sample index beyond the label's sample count
    pub const INDEX_OUT_OF_RANGE: i32 = 4002;

    /// Trim selection narrower than the minimum row count
    pub const TRIM_TOO_SMALL: i32 = 4003;

    /// Trim selection outside the sample's rows
    pub const INVALID_RANGE: i32 = 4004;

    /// Relabel source and target are identical
    pub const SAME_LABEL: i32 = 4005;

    /// Sample width differs from the store's dimensionality
    pub const DIMENSION_MISMATCH: i32 = 4006;

    /// Pipeline engine reported a training failure
    pub const TRAIN_FAILED: i32 = 4007;

    /// Training-sample checker rejected a recording
    pub const CHECK_FAILED: i32 = 4008;

    /// Nothing has been recorded
    pub const EMPTY_RECORDING: i32 = 4009;

    /// Training worker thread panicked
    pub const WORKER_PANICKED: i32 = 4010;

    /// Sample holds a NaN or infinite reading
    pub const NON_FINITE_VALUE: i32 = 4011;
}

/// Log a training error with structured context
pub fn log_training_error(err: &TrainingError, context: &str) {
    error!(
        "Training error in {}: code={}, component=TrainingSampleStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the training-sample store and the training scheduler
///
/// Store errors are precondition failures: the requested edit is skipped
/// and the store is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingError {
    InvalidLabel { label: u32, max: u32 },

    IndexOutOfRange { label: u32, index: usize, count: usize },

    TrimTooSmall { rows: usize, min: usize },

    InvalidRange { start: usize, end: usize, rows: usize },

    SameLabel { label: u32 },

    DimensionMismatch { expected: usize, actual: usize },

    TrainFailed,

    CheckFailed { message: String },

    EmptyRecording,

    WorkerPanicked,

    NonFiniteValue { row: usize, column: usize },
}

impl ErrorCode for TrainingError {
    fn code(&self) -> i32 {
        match self {
            TrainingError::InvalidLabel { .. } => TrainingErrorCodes::INVALID_LABEL,
            TrainingError::IndexOutOfRange { .. } => TrainingErrorCodes::INDEX_OUT_OF_RANGE,
            TrainingError::TrimTooSmall { .. } => TrainingErrorCodes::TRIM_TOO_SMALL,
            TrainingError::InvalidRange { .. } => TrainingErrorCodes::INVALID_RANGE,
            TrainingError::SameLabel { .. } => TrainingErrorCodes::SAME_LABEL,
            TrainingError::DimensionMismatch { .. } => TrainingErrorCodes::DIMENSION_MISMATCH,
            TrainingError::TrainFailed => TrainingErrorCodes::TRAIN_FAILED,
            TrainingError::CheckFailed { .. } => TrainingErrorCodes::CHECK_FAILED,
            TrainingError::EmptyRecording => TrainingErrorCodes::EMPTY_RECORDING,
            TrainingError::WorkerPanicked => TrainingErrorCodes::WORKER_PANICKED,
            TrainingError::NonFiniteValue { .. } => TrainingErrorCodes::NON_FINITE_VALUE,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainingError::InvalidLabel { label, max } => {
                format!("Label {} out of range [1, {}]", label, max)
            }
            TrainingError::IndexOutOfRange {
                label,
                index,
                count,
            } => format!(
                "Sample {} of label {} out of range (have {})",
                index, label, count
            ),
            TrainingError::TrimTooSmall { rows, min } => {
                format!("Selection of {} rows is below the minimum of {}", rows, min)
            }
            TrainingError::InvalidRange { start, end, rows } => format!(
                "Selection [{}, {}) is outside the sample's {} rows",
                start, end, rows
            ),
            TrainingError::SameLabel { label } => {
                format!("Sample already belongs to label {}", label)
            }
            TrainingError::DimensionMismatch { expected, actual } => format!(
                "Sample dimensionality mismatch: expected {}, got {}",
                expected, actual
            ),
            TrainingError::TrainFailed => "Failed to train the model".to_string(),
            TrainingError::CheckFailed { message } => {
                format!("Sample rejected by checker: {}", message)
            }
            TrainingError::EmptyRecording => "Nothing was recorded".to_string(),
            TrainingError::WorkerPanicked => "Training worker panicked".to_string(),
            TrainingError::NonFiniteValue { row, column } => format!(
                "Sample has a non-finite value at row {}, column {}",
                row, column
            ),
        }
    }
}

impl fmt::Display for TrainingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrainingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TrainingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_error_codes() {
        assert_eq!(
            TrainingError::InvalidLabel { label: 10, max: 9 }.code(),
            TrainingErrorCodes::INVALID_LABEL
        );
        assert_eq!(
            TrainingError::TrimTooSmall { rows: 4, min: 10 }.code(),
            TrainingErrorCodes::TRIM_TOO_SMALL
        );
        assert_eq!(
            TrainingError::TrainFailed.code(),
            TrainingErrorCodes::TRAIN_FAILED
        );
        assert_eq!(
            TrainingError::WorkerPanicked.code(),
            TrainingErrorCodes::WORKER_PANICKED
        );
        assert_eq!(
            TrainingError::NonFiniteValue { row: 3, column: 0 }.code(),
            TrainingErrorCodes::NON_FINITE_VALUE
        );
    }

    #[test]
    fn test_training_error_messages() {
        let err = TrainingError::InvalidLabel { label: 10, max: 9 };
        assert_eq!(err.message(), "Label 10 out of range [1, 9]");

        let err = TrainingError::IndexOutOfRange {
            label: 2,
            index: 5,
            count: 3,
        };
        assert!(err.message().contains("have 3"));

        let err = TrainingError::InvalidRange {
            start: 8,
            end: 30,
            rows: 20,
        };
        assert!(err.message().contains("[8, 30)"));
    }
}
