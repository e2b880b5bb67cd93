// Sample containers shared by the store, the pipeline, and persistence
//
// A `SampleMatrix` is one recording: rows are time steps, columns are the
// stream's N dimensions. `TimeSeriesClassificationData` is the flattened,
// pipeline-consumable view of a labeled collection of recordings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Row-major table of sensor readings with a fixed column count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMatrix {
    dimensions: usize,
    rows: Vec<Vec<f64>>,
}

impl SampleMatrix {
    /// Create an empty matrix with `dimensions` columns
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            rows: Vec::new(),
        }
    }

    /// Build a matrix from rows, rejecting any row of the wrong width
    pub fn from_rows(dimensions: usize, rows: Vec<Vec<f64>>) -> Result<Self, TrainingError> {
        if let Some(bad) = rows.iter().find(|row| row.len() != dimensions) {
            return Err(TrainingError::DimensionMismatch {
                expected: dimensions,
                actual: bad.len(),
            });
        }
        Ok(Self { dimensions, rows })
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), TrainingError> {
        if row.len() != self.dimensions {
            return Err(TrainingError::DimensionMismatch {
                expected: self.dimensions,
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Copy of the closed-open row range `[start, end)`
    pub fn slice(&self, start: usize, end: usize) -> Result<SampleMatrix, TrainingError> {
        if start > end || end > self.rows.len() {
            return Err(TrainingError::InvalidRange {
                start,
                end,
                rows: self.rows.len(),
            });
        }
        Ok(Self {
            dimensions: self.dimensions,
            rows: self.rows[start..end].to_vec(),
        })
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Smallest and largest value across all cells, `None` when empty
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.rows.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Position of the first NaN or infinite cell as `(row, column)`
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.iter().position(|v| !v.is_finite()).map(|c| (r, c))
        })
    }

    /// True when every row has exactly `dimensions` values
    pub fn is_consistent(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.dimensions)
    }
}

/// One recording tagged with its class label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSample {
    pub label: u32,
    pub data: SampleMatrix,
}

/// Flattened labeled dataset handed to `PipelineEngine::train`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesClassificationData {
    pub dataset_name: String,
    pub num_dimensions: usize,
    pub samples: Vec<ClassifiedSample>,
    #[serde(default)]
    pub class_names: BTreeMap<u32, String>,
}

impl TimeSeriesClassificationData {
    pub fn new(num_dimensions: usize, dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            num_dimensions,
            samples: Vec::new(),
            class_names: BTreeMap::new(),
        }
    }

    pub fn add_sample(&mut self, label: u32, data: SampleMatrix) -> Result<(), TrainingError> {
        if data.num_dimensions() != self.num_dimensions {
            return Err(TrainingError::DimensionMismatch {
                expected: self.num_dimensions,
                actual: data.num_dimensions(),
            });
        }
        self.samples.push(ClassifiedSample { label, data });
        Ok(())
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Number of distinct labels that have at least one sample
    pub fn num_classes(&self) -> usize {
        let mut labels: Vec<u32> = self.samples.iter().map(|s| s.label).collect();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }

    pub fn set_class_name(&mut self, label: u32, name: impl Into<String>) {
        self.class_names.insert(label, name.into());
    }

    pub fn class_name(&self, label: u32) -> Option<&str> {
        self.class_names.get(&label).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, dims: usize, offset: f64) -> SampleMatrix {
        let data = (0..rows)
            .map(|r| (0..dims).map(|c| offset + (r * dims + c) as f64).collect())
            .collect();
        SampleMatrix::from_rows(dims, data).unwrap()
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let result = SampleMatrix::from_rows(3, vec![vec![1.0, 2.0, 3.0], vec![1.0]]);
        assert_eq!(
            result,
            Err(TrainingError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn test_slice_is_closed_open() {
        let m = ramp(20, 2, 0.0);
        let s = m.slice(5, 15).unwrap();
        assert_eq!(s.num_rows(), 10);
        assert_eq!(s.row(0), m.row(5));
        assert_eq!(s.row(9), m.row(14));
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let m = ramp(5, 2, 0.0);
        assert!(matches!(
            m.slice(2, 6),
            Err(TrainingError::InvalidRange { rows: 5, .. })
        ));
        assert!(m.slice(4, 2).is_err());
    }

    #[test]
    fn test_value_range() {
        assert_eq!(SampleMatrix::new(2).value_range(), None);
        let m = ramp(3, 2, -1.0);
        assert_eq!(m.value_range(), Some((-1.0, 4.0)));
    }

    #[test]
    fn test_first_non_finite() {
        let mut m = ramp(4, 3, 0.0);
        assert_eq!(m.first_non_finite(), None);
        m.push_row(vec![0.0, f64::INFINITY, f64::NAN]).unwrap();
        assert_eq!(m.first_non_finite(), Some((4, 1)));
    }

    #[test]
    fn test_dataset_counts_classes() {
        let mut data = TimeSeriesClassificationData::new(2, "TrainingData");
        data.add_sample(1, ramp(4, 2, 0.0)).unwrap();
        data.add_sample(1, ramp(4, 2, 1.0)).unwrap();
        data.add_sample(3, ramp(4, 2, 2.0)).unwrap();
        assert_eq!(data.num_samples(), 3);
        assert_eq!(data.num_classes(), 2);
        assert!(data.add_sample(2, ramp(4, 3, 0.0)).is_err());
    }
}
