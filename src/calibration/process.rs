// CalibrationProcess - one calibration class and its fitted parameters
//
// A process owns the reference recording for its class and the parameters
// its fit routine derived from it. The recording is the source of truth:
// parameters are always re-derived by running the fit again, never stored.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::training::data::SampleMatrix;

/// Lifecycle of a calibration process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationStatus {
    Uncalibrated,
    /// Fit routine is running on a new recording
    Calibrating,
    Calibrated,
    /// Last recording was rejected; a new one can be recorded
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrateOutcome {
    Success,
    /// Parameters were fitted but the recording looks questionable
    Warning,
    Failure,
}

/// Result of fitting one recording, shown to the user as status text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrateResult {
    pub outcome: CalibrateOutcome,
    pub message: String,
}

impl CalibrateResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: CalibrateOutcome::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            outcome: CalibrateOutcome::Warning,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: CalibrateOutcome::Failure,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == CalibrateOutcome::Failure
    }
}

/// Parameters a fit routine derives from a recording
pub type CalibrationParams = Vec<f64>;

/// Fit routine: recording in, parameters plus a user-facing result out
pub type FitFn = Arc<dyn Fn(&SampleMatrix) -> (CalibrationParams, CalibrateResult) + Send + Sync>;

#[derive(Clone)]
pub struct CalibrationProcess {
    name: String,
    description: String,
    data: Option<SampleMatrix>,
    params: CalibrationParams,
    status: CalibrationStatus,
    last_result: Option<CalibrateResult>,
    fit: FitFn,
}

impl fmt::Debug for CalibrationProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationProcess")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("params", &self.params)
            .finish()
    }
}

impl CalibrationProcess {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        fit: impl Fn(&SampleMatrix) -> (CalibrationParams, CalibrateResult) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data: None,
            params: Vec::new(),
            status: CalibrationStatus::Uncalibrated,
            last_result: None,
            fit: Arc::new(fit),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn is_calibrated(&self) -> bool {
        self.status == CalibrationStatus::Calibrated
    }

    pub fn data(&self) -> Option<&SampleMatrix> {
        self.data.as_ref()
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn last_result(&self) -> Option<&CalibrateResult> {
        self.last_result.as_ref()
    }

    /// Run the fit routine on `data` and adopt it when the fit succeeds
    ///
    /// On failure the previous recording and parameters are discarded and
    /// the process is left `Failed`, ready for another recording.
    pub fn fit(&mut self, data: SampleMatrix) -> CalibrateResult {
        self.status = CalibrationStatus::Calibrating;
        let (params, result) = (self.fit)(&data);

        if result.is_failure() {
            self.data = None;
            self.params.clear();
            self.status = CalibrationStatus::Failed;
        } else {
            self.data = Some(data);
            self.params = params;
            self.status = CalibrationStatus::Calibrated;
        }
        self.last_result = Some(result.clone());
        result
    }

    /// Mark the recording as rejected before it reached the fit routine
    pub fn reject(&mut self, result: CalibrateResult) {
        self.data = None;
        self.params.clear();
        self.status = CalibrationStatus::Failed;
        self.last_result = Some(result);
    }

    pub fn reset(&mut self) {
        self.data = None;
        self.params.clear();
        self.status = CalibrationStatus::Uncalibrated;
        self.last_result = None;
    }
}
