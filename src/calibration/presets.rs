// Ready-made calibrators
//
// - mean_offset: one "Rest" recording; subtracts its per-dimension mean
// - range_normalize: "Rest" and "Peak" recordings; maps rest to 0 and peak to 1
//
// Both fits report a warning when the recording is completely flat, since a
// flat reference usually means the sensor was not connected.

use crate::calibration::calibrator::{params_at, Calibrator};
use crate::calibration::process::{CalibrateResult, CalibrationParams, CalibrationProcess};
use crate::training::data::SampleMatrix;

fn column_means(data: &SampleMatrix) -> CalibrationParams {
    let n = data.num_rows().max(1) as f64;
    (0..data.num_dimensions())
        .map(|k| data.rows().map(|row| row[k]).sum::<f64>() / n)
        .collect()
}

/// Per-dimension mean, failing on non-finite input
pub fn fit_mean(data: &SampleMatrix) -> (CalibrationParams, CalibrateResult) {
    if data.rows().flatten().any(|v| !v.is_finite()) {
        return (
            Vec::new(),
            CalibrateResult::failure("Recording contains non-finite values"),
        );
    }
    let means = column_means(data);
    let flat = match data.value_range() {
        Some((lo, hi)) => hi - lo == 0.0,
        None => true,
    };
    let result = if flat {
        CalibrateResult::warning("Recording is completely flat; is the sensor connected?")
    } else {
        CalibrateResult::success(format!("Calibrated from {} rows", data.num_rows()))
    };
    (means, result)
}

/// Subtract the resting mean from every row
pub fn mean_offset(dimensions: usize, min_samples: usize) -> Calibrator {
    Calibrator::new(
        dimensions,
        min_samples,
        vec![CalibrationProcess::new(
            "Rest",
            "Record the sensor at rest",
            fit_mean,
        )],
        |raw: &[f64], params: &[&[f64]]| {
            let rest = params_at(params, 0);
            raw.iter()
                .enumerate()
                .map(|(k, v)| v - rest.get(k).copied().unwrap_or(0.0))
                .collect()
        },
    )
}

/// Map the resting mean to 0 and the peak mean to 1, per dimension
///
/// Dimensions where rest and peak coincide map to 0.
pub fn range_normalize(dimensions: usize, min_samples: usize) -> Calibrator {
    Calibrator::new(
        dimensions,
        min_samples,
        vec![
            CalibrationProcess::new("Rest", "Record the sensor at rest", fit_mean),
            CalibrationProcess::new("Peak", "Record the sensor at its full range", fit_mean),
        ],
        |raw: &[f64], params: &[&[f64]]| {
            let rest = params_at(params, 0);
            let peak = params_at(params, 1);
            raw.iter()
                .enumerate()
                .map(|(k, v)| {
                    let lo = rest.get(k).copied().unwrap_or(0.0);
                    let hi = peak.get(k).copied().unwrap_or(0.0);
                    let span = hi - lo;
                    if span.abs() < f64::EPSILON {
                        0.0
                    } else {
                        (v - lo) / span
                    }
                })
                .collect()
        },
    )
}
