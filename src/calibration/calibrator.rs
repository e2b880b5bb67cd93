// Calibrator - raw-to-calibrated transform built from calibration processes
//
// The transform is only defined once every process is calibrated. Applying it
// earlier is a programming error and fails fast with `NotCalibrated` instead
// of passing raw rows through.

use std::fmt;
use std::sync::Arc;

use crate::calibration::process::{CalibrateResult, CalibrationProcess, CalibrationStatus};
use crate::error::{log_calibration_error, CalibrationError};
use crate::training::data::SampleMatrix;

/// User transform: raw row plus every process's parameters, in process order
pub type TransformFn = Arc<dyn Fn(&[f64], &[&[f64]]) -> Vec<f64> + Send + Sync>;

/// One process's saved recording, as exchanged with persistence
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationRecord {
    pub name: String,
    /// Empty when the process has no accepted recording
    pub data: SampleMatrix,
}

#[derive(Clone)]
pub struct Calibrator {
    dimensions: usize,
    min_samples: usize,
    processes: Vec<CalibrationProcess>,
    transform: TransformFn,
}

impl fmt::Debug for Calibrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calibrator")
            .field("dimensions", &self.dimensions)
            .field("processes", &self.processes)
            .finish()
    }
}

impl Calibrator {
    /// # Arguments
    /// * `dimensions` - Raw row width
    /// * `min_samples` - Minimum rows in a calibration recording
    /// * `processes` - One process per calibration class
    /// * `transform` - Applies fitted parameters to a raw row
    pub fn new(
        dimensions: usize,
        min_samples: usize,
        processes: Vec<CalibrationProcess>,
        transform: impl Fn(&[f64], &[&[f64]]) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        Self {
            dimensions,
            min_samples,
            processes,
            transform: Arc::new(transform),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn num_processes(&self) -> usize {
        self.processes.len()
    }

    pub fn processes(&self) -> &[CalibrationProcess] {
        &self.processes
    }

    pub fn process(&self, index: usize) -> Option<&CalibrationProcess> {
        self.processes.get(index)
    }

    /// True once every process has an accepted recording
    pub fn is_calibrated(&self) -> bool {
        !self.processes.is_empty() && self.processes.iter().all(CalibrationProcess::is_calibrated)
    }

    /// Apply the fitted transform to one raw row
    pub fn calibrate(&self, raw: &[f64]) -> Result<Vec<f64>, CalibrationError> {
        if !self.is_calibrated() {
            let err = CalibrationError::NotCalibrated;
            log_calibration_error(&err, "calibrate");
            return Err(err);
        }
        if raw.len() != self.dimensions {
            return Err(CalibrationError::DimensionMismatch {
                expected: self.dimensions,
                actual: raw.len(),
            });
        }
        let params: Vec<&[f64]> = self.processes.iter().map(CalibrationProcess::params).collect();
        Ok((self.transform)(raw, &params))
    }

    fn check_recording(&self, index: usize, data: &SampleMatrix) -> Result<(), CalibrationError> {
        if index >= self.processes.len() {
            return Err(CalibrationError::UnknownProcess {
                index,
                count: self.processes.len(),
            });
        }
        if data.num_dimensions() != self.dimensions {
            return Err(CalibrationError::DimensionMismatch {
                expected: self.dimensions,
                actual: data.num_dimensions(),
            });
        }
        if data.num_rows() < self.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                required: self.min_samples,
                collected: data.num_rows(),
            });
        }
        Ok(())
    }

    /// Store a new recording for process `index` and fit it
    ///
    /// A recording that is too short marks the process `Failed` without
    /// running the fit. A fit that reports failure is returned as
    /// `FitFailed`; the process is left `Failed` for a retry.
    pub fn record(&mut self, index: usize, data: SampleMatrix) -> Result<CalibrateResult, CalibrationError> {
        if let Err(err) = self.check_recording(index, &data) {
            log_calibration_error(&err, "record");
            if let (CalibrationError::InsufficientSamples { .. }, Some(process)) =
                (&err, self.processes.get_mut(index))
            {
                process.reject(CalibrateResult::failure(err.to_string()));
            }
            return Err(err);
        }

        let process = &mut self.processes[index];
        let result = process.fit(data);
        tracing::info!(
            "[Calibrator] Process '{}' -> {:?}: {}",
            process.name(),
            result.outcome,
            result.message
        );
        if result.is_failure() {
            let err = CalibrationError::FitFailed {
                process: process.name().to_string(),
                reason: result.message,
            };
            log_calibration_error(&err, "record");
            return Err(err);
        }
        Ok(result)
    }

    /// Recordings to persist, one per process in order
    pub fn records(&self) -> Vec<CalibrationRecord> {
        self.processes
            .iter()
            .map(|process| CalibrationRecord {
                name: process.name().to_string(),
                data: process
                    .data()
                    .cloned()
                    .unwrap_or_else(|| SampleMatrix::new(self.dimensions)),
            })
            .collect()
    }

    /// Re-derive every process from saved recordings
    ///
    /// Runs the same fit used for live recordings. All processes are fitted on
    /// a copy first; if any recording is invalid or fails to fit, nothing
    /// changes. Empty recordings leave their process uncalibrated. A saved
    /// name that differs from the process name only produces a warning.
    pub fn replay(&mut self, records: Vec<CalibrationRecord>) -> Result<Vec<CalibrateResult>, CalibrationError> {
        if records.len() != self.processes.len() {
            let err = CalibrationError::UnknownProcess {
                index: records.len(),
                count: self.processes.len(),
            };
            log_calibration_error(&err, "replay");
            return Err(err);
        }

        let mut processes = self.processes.clone();
        let mut results = Vec::with_capacity(records.len());
        for (index, (process, record)) in processes.iter_mut().zip(records).enumerate() {
            if record.name != process.name() {
                log::warn!(
                    "Calibration process {} was saved as '{}' but is now '{}'",
                    index,
                    record.name,
                    process.name()
                );
            }
            if record.data.is_empty() {
                process.reset();
                continue;
            }
            if let Err(err) = self.check_recording(index, &record.data) {
                log_calibration_error(&err, "replay");
                return Err(err);
            }
            let result = process.fit(record.data);
            if result.is_failure() {
                let err = CalibrationError::FitFailed {
                    process: process.name().to_string(),
                    reason: result.message,
                };
                log_calibration_error(&err, "replay");
                return Err(err);
            }
            results.push(result);
        }

        self.processes = processes;
        Ok(results)
    }

    pub fn reset(&mut self) {
        self.processes.iter_mut().for_each(CalibrationProcess::reset);
    }

    /// Status of each process, in order
    pub fn statuses(&self) -> Vec<CalibrationStatus> {
        self.processes.iter().map(CalibrationProcess::status).collect()
    }
}

/// Parameters of process `index`, or an empty slice
pub fn params_at<'a>(params: &[&'a [f64]], index: usize) -> &'a [f64] {
    params.get(index).copied().unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::process::CalibrateOutcome;

    fn first_value_fit(data: &SampleMatrix) -> (Vec<f64>, CalibrateResult) {
        let first = data.row(0).map(|row| row.to_vec()).unwrap_or_default();
        if first.iter().any(|v| *v < 0.0) {
            (Vec::new(), CalibrateResult::failure("negative baseline"))
        } else {
            (first, CalibrateResult::success("ok"))
        }
    }

    fn offset_calibrator() -> Calibrator {
        Calibrator::new(
            2,
            3,
            vec![
                CalibrationProcess::new("Rest", "Hold still", first_value_fit),
                CalibrationProcess::new("Peak", "Move fully", first_value_fit),
            ],
            |raw: &[f64], params: &[&[f64]]| {
                let rest = params_at(params, 0);
                raw.iter().zip(rest).map(|(v, r)| v - r).collect()
            },
        )
    }

    fn recording(value: f64, rows: usize) -> SampleMatrix {
        SampleMatrix::from_rows(2, vec![vec![value, value]; rows]).unwrap()
    }

    #[test]
    fn test_calibrate_before_ready_fails_fast() {
        let mut calibrator = offset_calibrator();
        assert_eq!(calibrator.calibrate(&[1.0, 1.0]), Err(CalibrationError::NotCalibrated));

        calibrator.record(0, recording(1.0, 5)).unwrap();
        assert!(!calibrator.is_calibrated());
        assert_eq!(calibrator.calibrate(&[1.0, 1.0]), Err(CalibrationError::NotCalibrated));
    }

    #[test]
    fn test_calibrate_applies_transform() {
        let mut calibrator = offset_calibrator();
        calibrator.record(0, recording(1.0, 5)).unwrap();
        let result = calibrator.record(1, recording(4.0, 5)).unwrap();
        assert_eq!(result.outcome, CalibrateOutcome::Success);

        assert!(calibrator.is_calibrated());
        assert_eq!(calibrator.calibrate(&[3.0, 5.0]).unwrap(), vec![2.0, 4.0]);
        assert!(matches!(
            calibrator.calibrate(&[1.0]),
            Err(CalibrationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_short_recording_marks_process_failed() {
        let mut calibrator = offset_calibrator();
        let err = calibrator.record(0, recording(1.0, 2)).unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InsufficientSamples {
                required: 3,
                collected: 2
            }
        );
        assert_eq!(calibrator.statuses()[0], CalibrationStatus::Failed);
    }

    #[test]
    fn test_fit_failure_and_unknown_process() {
        let mut calibrator = offset_calibrator();
        assert!(matches!(
            calibrator.record(0, recording(-1.0, 5)),
            Err(CalibrationError::FitFailed { .. })
        ));
        assert!(matches!(
            calibrator.record(7, recording(1.0, 5)),
            Err(CalibrationError::UnknownProcess { index: 7, count: 2 })
        ));
    }

    #[test]
    fn test_replay_reproduces_transform() {
        let mut live = offset_calibrator();
        live.record(0, recording(2.0, 5)).unwrap();
        live.record(1, recording(6.0, 5)).unwrap();
        let expected = live.calibrate(&[7.0, 9.0]).unwrap();

        let mut restored = offset_calibrator();
        restored.replay(live.records()).unwrap();
        assert_eq!(restored.calibrate(&[7.0, 9.0]).unwrap(), expected);
    }

    #[test]
    fn test_replay_is_all_or_nothing() {
        let mut calibrator = offset_calibrator();
        calibrator.record(0, recording(1.0, 5)).unwrap();
        calibrator.record(1, recording(2.0, 5)).unwrap();

        let records = vec![
            CalibrationRecord {
                name: "Rest".to_string(),
                data: recording(5.0, 5),
            },
            CalibrationRecord {
                name: "Peak".to_string(),
                data: recording(-1.0, 5),
            },
        ];
        assert!(calibrator.replay(records).is_err());
        assert_eq!(calibrator.calibrate(&[1.0, 1.0]).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_replay_tolerates_renamed_process_and_empty_records() {
        let mut calibrator = offset_calibrator();
        let records = vec![
            CalibrationRecord {
                name: "Baseline".to_string(),
                data: recording(1.0, 5),
            },
            CalibrationRecord {
                name: "Peak".to_string(),
                data: SampleMatrix::new(2),
            },
        ];
        let results = calibrator.replay(records).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            calibrator.statuses(),
            vec![CalibrationStatus::Calibrated, CalibrationStatus::Uncalibrated]
        );
    }

    #[test]
    fn test_replay_rejects_wrong_count() {
        let mut calibrator = offset_calibrator();
        let records = vec![CalibrationRecord {
            name: "Rest".to_string(),
            data: recording(1.0, 5),
        }];
        assert!(matches!(
            calibrator.replay(records),
            Err(CalibrationError::UnknownProcess { .. })
        ));
    }
}
