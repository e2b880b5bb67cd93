// Training-sample checker - optional quality gate for new recordings

use serde::{Deserialize, Serialize};

use crate::training::data::SampleMatrix;

/// Outcome category reported by a checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckOutcome {
    Success,
    /// Sample is kept but the user is told about a concern
    Warning,
    /// Sample is discarded
    Failure,
}

/// Result of checking one recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSampleCheckResult {
    pub outcome: CheckOutcome,
    pub message: String,
}

impl TrainingSampleCheckResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: CheckOutcome::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            outcome: CheckOutcome::Warning,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: CheckOutcome::Failure,
            message: message.into(),
        }
    }

    pub fn accepts(&self) -> bool {
        self.outcome != CheckOutcome::Failure
    }
}

/// User-supplied check run on every recording before it enters the store
pub type TrainingSampleChecker =
    Box<dyn Fn(&SampleMatrix) -> TrainingSampleCheckResult + Send + Sync>;

/// Checker rejecting recordings shorter than `min_rows`
pub fn min_length_checker(min_rows: usize) -> TrainingSampleChecker {
    Box::new(move |sample: &SampleMatrix| {
        if sample.num_rows() < min_rows {
            TrainingSampleCheckResult::failure(format!(
                "sample has {} rows, need at least {}",
                sample.num_rows(),
                min_rows
            ))
        } else {
            TrainingSampleCheckResult::success("ok")
        }
    })
}
