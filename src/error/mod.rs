// Error types for the ESP trainer core
//
// This module defines one error enum per concern (input stream, calibration,
// pipeline, training data, persistence). Every enum carries a numeric code so
// presentation layers can react programmatically, and a `log_*_error` helper
// that reports it with structured context.

mod calibration;
mod persistence;
mod pipeline;
mod session;
mod stream;
mod training;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use persistence::{log_persistence_error, PersistenceError, PersistenceErrorCodes};
pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};
pub use session::SessionError;
pub use stream::{log_stream_error, StreamError, StreamErrorCodes};
pub use training::{log_training_error, TrainingError, TrainingErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent status reporting across
/// the session boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let errors: Vec<Box<dyn ErrorCode>> = vec![
            Box::new(StreamError::NotStarted),
            Box::new(CalibrationError::NotCalibrated),
            Box::new(PipelineError::NotTrained),
            Box::new(TrainingError::SameLabel { label: 3 }),
            Box::new(PersistenceError::Io {
                path: "x".to_string(),
                details: "denied".to_string(),
            }),
        ];

        let codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec![1002, 2004, 3003, 4005, 5001]);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), TrainingError> {
            Err(TrainingError::InvalidLabel { label: 0, max: 9 })
        }

        fn caller() -> Result<(), TrainingError> {
            may_fail()?;
            Ok(())
        }

        assert!(caller().is_err());
    }
}
