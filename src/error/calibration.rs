// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2006
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Insufficient rows recorded for a calibration process
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Fit routine rejected the recorded data
    pub const FIT_FAILED: i32 = 2002;

    /// Calibration process index out of range
    pub const UNKNOWN_PROCESS: i32 = 2003;

    /// Transform requested while not calibrated
    pub const NOT_CALIBRATED: i32 = 2004;

    /// Row width differs from the calibrator's dimensionality
    pub const DIMENSION_MISMATCH: i32 = 2005;

    /// No calibrator configured for this session
    pub const NO_CALIBRATOR: i32 = 2006;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=Calibrator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These errors cover recording, fitting, and applying calibration
/// transforms.
///
/// Error code ranges: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Insufficient rows recorded for calibration
    InsufficientSamples { required: usize, collected: usize },

    /// Fit routine reported failure
    FitFailed { process: String, reason: String },

    /// No calibration process at this index
    UnknownProcess { index: usize, count: usize },

    /// Transform applied before every process is calibrated
    NotCalibrated,

    /// Raw row width differs from expected dimensionality
    DimensionMismatch { expected: usize, actual: usize },

    /// Session has no calibrator
    NoCalibrator,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::FitFailed { .. } => CalibrationErrorCodes::FIT_FAILED,
            CalibrationError::UnknownProcess { .. } => CalibrationErrorCodes::UNKNOWN_PROCESS,
            CalibrationError::NotCalibrated => CalibrationErrorCodes::NOT_CALIBRATED,
            CalibrationError::DimensionMismatch { .. } => {
                CalibrationErrorCodes::DIMENSION_MISMATCH
            }
            CalibrationError::NoCalibrator => CalibrationErrorCodes::NO_CALIBRATOR,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
            CalibrationError::FitFailed { process, reason } => {
                format!("{} calibration failed: {}", process, reason)
            }
            CalibrationError::UnknownProcess { index, count } => format!(
                "Calibration process {} out of range (have {})",
                index, count
            ),
            CalibrationError::NotCalibrated => {
                "Calibrator used before calibration completed".to_string()
            }
            CalibrationError::DimensionMismatch { expected, actual } => format!(
                "Calibration dimensionality mismatch: expected {}, got {}",
                expected, actual
            ),
            CalibrationError::NoCalibrator => "No calibrator configured".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::InsufficientSamples {
                required: 10,
                collected: 3
            }
            .code(),
            CalibrationErrorCodes::INSUFFICIENT_SAMPLES
        );
        assert_eq!(
            CalibrationError::FitFailed {
                process: "Rest".to_string(),
                reason: "flat".to_string()
            }
            .code(),
            CalibrationErrorCodes::FIT_FAILED
        );
        assert_eq!(
            CalibrationError::UnknownProcess { index: 4, count: 2 }.code(),
            CalibrationErrorCodes::UNKNOWN_PROCESS
        );
        assert_eq!(
            CalibrationError::NotCalibrated.code(),
            CalibrationErrorCodes::NOT_CALIBRATED
        );
        assert_eq!(
            CalibrationError::NoCalibrator.code(),
            CalibrationErrorCodes::NO_CALIBRATOR
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::InsufficientSamples {
            required: 10,
            collected: 3,
        };
        assert_eq!(err.message(), "Insufficient samples: need 10, got 3");

        let err = CalibrationError::FitFailed {
            process: "Upright".to_string(),
            reason: "no variance".to_string(),
        };
        assert_eq!(err.message(), "Upright calibration failed: no variance");

        let display = format!("{}", CalibrationError::NotCalibrated);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains("2004"));
    }
}
