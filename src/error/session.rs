// Session-level error type
//
// Session actions often span two concerns (a store lookup followed by a
// pipeline call, a load followed by a calibration replay). SessionError wraps
// the concern error so callers keep its code and message.

use crate::error::{
    CalibrationError, ErrorCode, PersistenceError, PipelineError, StreamError, TrainingError,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Stream(StreamError),
    Calibration(CalibrationError),
    Pipeline(PipelineError),
    Training(TrainingError),
    Persistence(PersistenceError),
}

impl SessionError {
    fn inner(&self) -> &dyn ErrorCode {
        match self {
            SessionError::Stream(e) => e,
            SessionError::Calibration(e) => e,
            SessionError::Pipeline(e) => e,
            SessionError::Training(e) => e,
            SessionError::Persistence(e) => e,
        }
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        self.inner().code()
    }

    fn message(&self) -> String {
        self.inner().message()
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Stream(e) => write!(f, "{}", e),
            SessionError::Calibration(e) => write!(f, "{}", e),
            SessionError::Pipeline(e) => write!(f, "{}", e),
            SessionError::Training(e) => write!(f, "{}", e),
            SessionError::Persistence(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StreamError> for SessionError {
    fn from(err: StreamError) -> Self {
        SessionError::Stream(err)
    }
}

impl From<CalibrationError> for SessionError {
    fn from(err: CalibrationError) -> Self {
        SessionError::Calibration(err)
    }
}

impl From<PipelineError> for SessionError {
    fn from(err: PipelineError) -> Self {
        SessionError::Pipeline(err)
    }
}

impl From<TrainingError> for SessionError {
    fn from(err: TrainingError) -> Self {
        SessionError::Training(err)
    }
}

impl From<PersistenceError> for SessionError {
    fn from(err: PersistenceError) -> Self {
        SessionError::Persistence(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_keeps_inner_code() {
        let err: SessionError = TrainingError::EmptyRecording.into();
        assert_eq!(err.code(), TrainingError::EmptyRecording.code());
        assert_eq!(err.message(), "Nothing was recorded");

        let err: SessionError = CalibrationError::NoCalibrator.into();
        assert_eq!(err.code(), 2006);
    }
}
