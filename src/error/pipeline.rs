// Pipeline engine error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Pipeline error code constants
///
/// Error code range: 3001-3005
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    pub const PREPROCESS_FAILED: i32 = 3001;
    pub const PREDICT_FAILED: i32 = 3002;
    pub const NOT_TRAINED: i32 = 3003;
    pub const STAGE_OUT_OF_RANGE: i32 = 3004;
    pub const NO_FEATURE_STAGES: i32 = 3005;
}

/// Log a pipeline error with structured context
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=PipelineRunner, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Transient per-sample pipeline failures
///
/// None of these are fatal: the current tick skips its downstream stages
/// and the next sample is processed normally.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// `preProcessData` returned false for a sample
    PreprocessFailed,

    /// `predict` returned false for a sample
    PredictFailed,

    /// Prediction requested on an untrained pipeline
    NotTrained,

    /// Stage index beyond the engine's stage count
    StageOutOfRange { index: usize, count: usize },

    /// Feature view requested but the engine has no feature stages
    NoFeatureStages,
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::PreprocessFailed => PipelineErrorCodes::PREPROCESS_FAILED,
            PipelineError::PredictFailed => PipelineErrorCodes::PREDICT_FAILED,
            PipelineError::NotTrained => PipelineErrorCodes::NOT_TRAINED,
            PipelineError::StageOutOfRange { .. } => PipelineErrorCodes::STAGE_OUT_OF_RANGE,
            PipelineError::NoFeatureStages => PipelineErrorCodes::NO_FEATURE_STAGES,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::PreprocessFailed => "Failed to compute features".to_string(),
            PipelineError::PredictFailed => "Prediction failed".to_string(),
            PipelineError::NotTrained => "Pipeline is not trained".to_string(),
            PipelineError::StageOutOfRange { index, count } => {
                format!("Stage {} out of range (pipeline has {})", index, count)
            }
            PipelineError::NoFeatureStages => {
                "Pipeline has no feature extraction stages".to_string()
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_codes() {
        assert_eq!(PipelineError::PreprocessFailed.code(), 3001);
        assert_eq!(PipelineError::PredictFailed.code(), 3002);
        assert_eq!(PipelineError::NotTrained.code(), 3003);
        assert_eq!(
            PipelineError::StageOutOfRange { index: 2, count: 1 }.code(),
            3004
        );
        assert_eq!(PipelineError::NoFeatureStages.code(), 3005);
    }

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::StageOutOfRange { index: 2, count: 1 };
        assert_eq!(err.message(), "Stage 2 out of range (pipeline has 1)");
        assert!(format!("{}", err).contains("3004"));
    }
}
