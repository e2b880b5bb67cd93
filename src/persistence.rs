// PersistenceAdapter - JSON save/load for calibration, training and test data
//
// Every load parses and validates the whole document before anything is
// applied: sample counts, dimensionality and per-row widths must all match
// the active session. A rejected load leaves the in-memory state untouched.

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::calibration::{CalibrateResult, CalibrationRecord, Calibrator};
use crate::error::{log_persistence_error, PersistenceError};
use crate::training::data::{SampleMatrix, TimeSeriesClassificationData};
use crate::training::store::TrainingSampleStore;

pub const CALIBRATION_DATASET_NAME: &str = "CalibrationData";

/// On-disk calibration document: one named recording per process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationDocument {
    pub dataset_name: String,
    pub num_dimensions: usize,
    pub samples: Vec<NamedSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSample {
    pub name: String,
    pub data: SampleMatrix,
}

/// On-disk test recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDocument {
    pub num_dimensions: usize,
    pub data: SampleMatrix,
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        details: err.to_string(),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PersistenceError::Format {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
    }
    fs::write(path, json).map_err(|e| io_error(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
    let contents = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&contents).map_err(|e| PersistenceError::Format {
        path: path.display().to_string(),
        details: e.to_string(),
    })
}

fn check_dimensions(expected: usize, actual: usize) -> Result<(), PersistenceError> {
    if expected != actual {
        return Err(PersistenceError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

fn check_matrix(expected: usize, matrix: &SampleMatrix) -> Result<(), PersistenceError> {
    check_dimensions(expected, matrix.num_dimensions())?;
    if !matrix.is_consistent() {
        return Err(PersistenceError::InvalidContent {
            reason: "row width differs from declared dimensionality".to_string(),
        });
    }
    Ok(())
}

fn logged<T>(result: Result<T, PersistenceError>, context: &str) -> Result<T, PersistenceError> {
    if let Err(err) = &result {
        log_persistence_error(err, context);
    }
    result
}

/// Save every calibration process's recording
pub fn save_calibration(path: &Path, calibrator: &Calibrator) -> Result<(), PersistenceError> {
    let document = CalibrationDocument {
        dataset_name: CALIBRATION_DATASET_NAME.to_string(),
        num_dimensions: calibrator.dimensions(),
        samples: calibrator
            .records()
            .into_iter()
            .map(|record| NamedSample {
                name: record.name,
                data: record.data,
            })
            .collect(),
    };
    logged(write_json(path, &document), "save_calibration")?;
    log::info!("Saved calibration data to {}", path.display());
    Ok(())
}

/// Load calibration recordings and re-fit every process from them
///
/// # Returns
/// The fit result of each non-empty recording
pub fn load_calibration(path: &Path, calibrator: &mut Calibrator) -> Result<Vec<CalibrateResult>, PersistenceError> {
    logged(load_calibration_inner(path, calibrator), "load_calibration")
}

fn load_calibration_inner(
    path: &Path,
    calibrator: &mut Calibrator,
) -> Result<Vec<CalibrateResult>, PersistenceError> {
    let document: CalibrationDocument = read_json(path)?;
    if document.samples.len() != calibrator.num_processes() {
        return Err(PersistenceError::SampleCountMismatch {
            expected: calibrator.num_processes(),
            actual: document.samples.len(),
        });
    }
    check_dimensions(calibrator.dimensions(), document.num_dimensions)?;
    for sample in &document.samples {
        check_matrix(calibrator.dimensions(), &sample.data)?;
    }

    let records = document
        .samples
        .into_iter()
        .map(|sample| CalibrationRecord {
            name: sample.name,
            data: sample.data,
        })
        .collect();
    calibrator
        .replay(records)
        .map_err(|e| PersistenceError::InvalidContent { reason: e.to_string() })
}

/// Save all training samples with their label names
pub fn save_training(path: &Path, store: &TrainingSampleStore) -> Result<(), PersistenceError> {
    logged(write_json(path, &store.all_data()), "save_training")?;
    log::info!(
        "Saved {} training samples to {}",
        store.total_samples(),
        path.display()
    );
    Ok(())
}

/// Replace the store's contents with a saved dataset
///
/// # Returns
/// Number of samples loaded
pub fn load_training(path: &Path, store: &mut TrainingSampleStore) -> Result<usize, PersistenceError> {
    logged(load_training_inner(path, store), "load_training")
}

/// Parse a saved training dataset without applying it anywhere
pub fn read_training(path: &Path) -> Result<TimeSeriesClassificationData, PersistenceError> {
    logged(read_training_inner(path), "read_training")
}

fn read_training_inner(path: &Path) -> Result<TimeSeriesClassificationData, PersistenceError> {
    let data: TimeSeriesClassificationData = read_json(path)?;
    for sample in data.iter() {
        check_matrix(data.num_dimensions, &sample.data)?;
    }
    Ok(data)
}

fn load_training_inner(path: &Path, store: &mut TrainingSampleStore) -> Result<usize, PersistenceError> {
    let data = read_training_inner(path)?;
    check_dimensions(store.num_dimensions(), data.num_dimensions)?;

    let count = data.num_samples();
    store
        .replace_with(data)
        .map_err(|e| PersistenceError::InvalidContent { reason: e.to_string() })?;
    Ok(count)
}

pub fn save_test(path: &Path, data: &SampleMatrix) -> Result<(), PersistenceError> {
    let document = TestDocument {
        num_dimensions: data.num_dimensions(),
        data: data.clone(),
    };
    logged(write_json(path, &document), "save_test")
}

/// Read a test recording of the given dimensionality
pub fn load_test(path: &Path, dimensions: usize) -> Result<SampleMatrix, PersistenceError> {
    logged(load_test_inner(path, dimensions), "load_test")
}

fn load_test_inner(path: &Path, dimensions: usize) -> Result<SampleMatrix, PersistenceError> {
    let document: TestDocument = read_json(path)?;
    check_dimensions(dimensions, document.num_dimensions)?;
    check_matrix(dimensions, &document.data)?;
    Ok(document.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::presets;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::tempdir;

    fn recording(dims: usize, rows: usize, value: f64) -> SampleMatrix {
        SampleMatrix::from_rows(dims, vec![vec![value; dims]; rows]).unwrap()
    }

    fn noisy(rng: &mut StdRng, dims: usize, rows: usize, center: f64) -> SampleMatrix {
        let rows = (0..rows)
            .map(|_| (0..dims).map(|_| center + rng.gen_range(-1.0..1.0)).collect())
            .collect();
        SampleMatrix::from_rows(dims, rows).unwrap()
    }

    #[test]
    fn test_calibration_round_trip_reproduces_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CalibrationData.json");

        let mut live = presets::range_normalize(2, 3);
        live.record(0, recording(2, 5, 1.0)).unwrap();
        live.record(1, recording(2, 5, 5.0)).unwrap();
        save_calibration(&path, &live).unwrap();

        let mut restored = presets::range_normalize(2, 3);
        let results = load_calibration(&path, &mut restored).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            restored.calibrate(&[3.0, 4.0]).unwrap(),
            live.calibrate(&[3.0, 4.0]).unwrap()
        );
    }

    #[test]
    fn test_test_data_round_trip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("TestData.json");
        let mut rng = StdRng::seed_from_u64(11);
        let data = noisy(&mut rng, 2, 5000, 0.0);
        save_test(&path, &data).unwrap();

        let loaded = load_test(&path, 2).unwrap();
        let mismatched = data
            .rows()
            .zip(loaded.rows())
            .flat_map(|(a, b)| a.iter().zip(b))
            .filter(|(a, b)| a.to_bits() != b.to_bits())
            .count();
        assert_eq!(loaded.num_rows(), 5000);
        assert_eq!(mismatched, 0);
    }

    #[test]
    fn test_noisy_calibration_round_trip_matches_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CalibrationData.json");

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut live = presets::range_normalize(2, 5);
            live.record(0, noisy(&mut rng, 2, 12, 1.0)).unwrap();
            live.record(1, noisy(&mut rng, 2, 12, 6.0)).unwrap();
            save_calibration(&path, &live).unwrap();

            let mut restored = presets::range_normalize(2, 5);
            load_calibration(&path, &mut restored).unwrap();
            let row = [3.3333, 4.4444];
            let expected = live.calibrate(&row).unwrap();
            let actual = restored.calibrate(&row).unwrap();
            assert_eq!(
                expected.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                actual.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                "seed {seed}"
            );
        }
    }

    #[test]
    fn test_calibration_count_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cal.json");
        let mut one = presets::mean_offset(2, 3);
        one.record(0, recording(2, 5, 1.0)).unwrap();
        save_calibration(&path, &one).unwrap();

        let mut two = presets::range_normalize(2, 3);
        assert_eq!(
            load_calibration(&path, &mut two),
            Err(PersistenceError::SampleCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(!two.is_calibrated());
    }

    #[test]
    fn test_training_round_trip_keeps_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("TrainingData.json");

        let mut store = TrainingSampleStore::new(3, 9, 10);
        store.add_sample(2, recording(3, 12, 1.0)).unwrap();
        store.add_sample(2, recording(3, 14, 2.0)).unwrap();
        store.rename_label(2, "Wave").unwrap();
        save_training(&path, &store).unwrap();

        let mut loaded = TrainingSampleStore::new(3, 9, 10);
        assert_eq!(load_training(&path, &mut loaded).unwrap(), 2);
        assert_eq!(loaded.num_samples_for_label(2), 2);
        assert_eq!(loaded.label_name(2), Some("Wave"));
        assert_eq!(loaded.sample(2, 1), store.sample(2, 1));
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn test_read_training_reports_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("TrainingData.json");
        let mut store = TrainingSampleStore::new(4, 9, 10);
        store.add_sample(3, recording(4, 12, 1.0)).unwrap();
        save_training(&path, &store).unwrap();

        let data = read_training(&path).unwrap();
        assert_eq!(data.num_dimensions, 4);
        assert_eq!(data.num_samples(), 1);
    }

    #[test]
    fn test_training_dimension_mismatch_leaves_store_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("TrainingData.json");
        let mut wide = TrainingSampleStore::new(4, 9, 10);
        wide.add_sample(1, recording(4, 12, 1.0)).unwrap();
        save_training(&path, &wide).unwrap();

        let mut store = TrainingSampleStore::new(3, 9, 10);
        store.add_sample(1, recording(3, 12, 0.0)).unwrap();
        assert_eq!(
            load_training(&path, &mut store),
            Err(PersistenceError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        );
        assert_eq!(store.num_samples_for_label(1), 1);
    }

    #[test]
    fn test_test_data_round_trip_and_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("TestData.json");
        let data = recording(3, 20, 0.5);
        save_test(&path, &data).unwrap();

        assert_eq!(load_test(&path, 3).unwrap(), data);
        assert!(matches!(
            load_test(&path, 2),
            Err(PersistenceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(load_test(&missing, 3), Err(PersistenceError::Io { .. })));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{ not json").unwrap();
        let mut store = TrainingSampleStore::new(3, 9, 10);
        assert!(matches!(
            load_training(&garbage, &mut store),
            Err(PersistenceError::Format { .. })
        ));
    }
}
