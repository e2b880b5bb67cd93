// Calibration module - optional raw-to-calibrated transform ahead of the pipeline
//
// This module provides three components:
// 1. CalibrationProcess: one calibration class, its recording and fit routine
// 2. Calibrator: applies the fitted transform once every process is calibrated
// 3. presets: ready-made calibrators for the CLI and tests
//
// The calibration workflow:
// 1. Record a reference sample for each process
// 2. The process's fit routine derives its parameters (or rejects the recording)
// 3. Once all processes are calibrated, live rows pass through `calibrate`

pub mod calibrator;
pub mod presets;
pub mod process;

pub use calibrator::{params_at, CalibrationRecord, Calibrator, TransformFn};
pub use process::{
    CalibrateOutcome, CalibrateResult, CalibrationParams, CalibrationProcess, CalibrationStatus,
    FitFn,
};
