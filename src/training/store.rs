// TrainingSampleStore - labeled recording ownership and editing
//
// The store exclusively owns every recorded training sample. Samples are
// grouped per label (1..=max_labels) and addressed by (label, index), where
// index is the sample's current position inside its label and shifts when an
// earlier sample is removed.
//
// Every structural edit (add, delete, trim, relabel, rename) goes through
// this API so positions stay contiguous and the dirty flag stays accurate.
// Edits validate all of their preconditions before touching any state, so a
// rejected edit leaves the store exactly as it was.

use crate::error::{log_training_error, TrainingError};
use crate::training::data::{ClassifiedSample, SampleMatrix, TimeSeriesClassificationData};

/// Dataset name used for the flattened view and for persisted files
pub const TRAINING_DATASET_NAME: &str = "TrainingData";

/// Per-label collections of recorded samples plus display names
#[derive(Debug, Clone)]
pub struct TrainingSampleStore {
    num_dimensions: usize,
    max_labels: u32,
    min_trim_rows: usize,
    sets: Vec<Vec<SampleMatrix>>,
    names: Vec<String>,
    dirty: bool,
}

impl TrainingSampleStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `num_dimensions` - Column count every sample must have
    /// * `max_labels` - Labels are `1..=max_labels`
    /// * `min_trim_rows` - Narrowest selection `trim_sample` accepts
    pub fn new(num_dimensions: usize, max_labels: u32, min_trim_rows: usize) -> Self {
        Self {
            num_dimensions,
            max_labels,
            min_trim_rows,
            sets: vec![Vec::new(); max_labels as usize],
            names: (1..=max_labels).map(default_label_name).collect(),
            dirty: false,
        }
    }

    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    pub fn max_labels(&self) -> u32 {
        self.max_labels
    }

    pub fn min_trim_rows(&self) -> usize {
        self.min_trim_rows
    }

    /// True when the store has edits that were not persisted yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after a successful save or load
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn contains_label(&self, label: u32) -> bool {
        label >= 1 && label <= self.max_labels
    }

    fn slot(&self, label: u32) -> Result<usize, TrainingError> {
        if self.contains_label(label) {
            Ok((label - 1) as usize)
        } else {
            Err(TrainingError::InvalidLabel {
                label,
                max: self.max_labels,
            })
        }
    }

    fn check_index(&self, label: u32, index: usize) -> Result<usize, TrainingError> {
        let slot = self.slot(label)?;
        let count = self.sets[slot].len();
        if index >= count {
            return Err(TrainingError::IndexOutOfRange {
                label,
                index,
                count,
            });
        }
        Ok(slot)
    }

    /// Append a sample to a label's set
    ///
    /// # Returns
    /// * `Ok(index)` - Position of the new sample within its label
    /// * `Err(TrainingError)` - Invalid label, wrong width, or empty sample
    pub fn add_sample(&mut self, label: u32, sample: SampleMatrix) -> Result<usize, TrainingError> {
        let result = self.try_add(label, sample);
        if let Err(err) = &result {
            log_training_error(err, "add_sample");
        }
        result
    }

    fn try_add(&mut self, label: u32, sample: SampleMatrix) -> Result<usize, TrainingError> {
        let slot = self.slot(label)?;
        self.check_sample(&sample)?;
        self.sets[slot].push(sample);
        self.dirty = true;
        Ok(self.sets[slot].len() - 1)
    }

    fn check_sample(&self, sample: &SampleMatrix) -> Result<(), TrainingError> {
        if sample.num_dimensions() != self.num_dimensions || !sample.is_consistent() {
            return Err(TrainingError::DimensionMismatch {
                expected: self.num_dimensions,
                actual: sample.num_dimensions(),
            });
        }
        if sample.is_empty() {
            return Err(TrainingError::EmptyRecording);
        }
        // JSON has no NaN or infinity, so such a sample could never be reloaded
        if let Some((row, column)) = sample.first_non_finite() {
            return Err(TrainingError::NonFiniteValue { row, column });
        }
        Ok(())
    }

    /// Remove the sample at `index`; later samples shift down by one
    pub fn delete_sample(&mut self, label: u32, index: usize) -> Result<SampleMatrix, TrainingError> {
        let slot = self
            .check_index(label, index)
            .inspect_err(|err| log_training_error(err, "delete_sample"))?;
        let removed = self.sets[slot].remove(index);
        self.dirty = true;
        Ok(removed)
    }

    /// Crop a sample to the closed-open row range `[start, end)`
    ///
    /// Selections narrower than `min_trim_rows` are rejected so an accidental
    /// click does not destroy a recording.
    pub fn trim_sample(
        &mut self,
        label: u32,
        index: usize,
        start: usize,
        end: usize,
    ) -> Result<(), TrainingError> {
        let result = self.try_trim(label, index, start, end);
        if let Err(err) = &result {
            log_training_error(err, "trim_sample");
        }
        result
    }

    fn try_trim(
        &mut self,
        label: u32,
        index: usize,
        start: usize,
        end: usize,
    ) -> Result<(), TrainingError> {
        let slot = self.check_index(label, index)?;
        if end <= start {
            return Err(TrainingError::InvalidRange {
                start,
                end,
                rows: self.sets[slot][index].num_rows(),
            });
        }
        let width = end - start;
        if width < self.min_trim_rows {
            return Err(TrainingError::TrimTooSmall {
                rows: width,
                min: self.min_trim_rows,
            });
        }
        let trimmed = self.sets[slot][index].slice(start, end)?;
        self.sets[slot][index] = trimmed;
        self.dirty = true;
        Ok(())
    }

    /// Move a sample from one label to the end of another
    ///
    /// # Returns
    /// * `Ok(index)` - Position of the moved sample within `target`
    pub fn relabel_sample(
        &mut self,
        source: u32,
        index: usize,
        target: u32,
    ) -> Result<usize, TrainingError> {
        let result = self.try_relabel(source, index, target);
        if let Err(err) = &result {
            log_training_error(err, "relabel_sample");
        }
        result
    }

    fn try_relabel(&mut self, source: u32, index: usize, target: u32) -> Result<usize, TrainingError> {
        let source_slot = self.check_index(source, index)?;
        let target_slot = self.slot(target)?;
        if source == target {
            return Err(TrainingError::SameLabel { label: source });
        }

        // Both slots are validated; the two mutations below cannot fail.
        let sample = self.sets[source_slot].remove(index);
        self.sets[target_slot].push(sample);
        self.dirty = true;
        Ok(self.sets[target_slot].len() - 1)
    }

    pub fn rename_label(&mut self, label: u32, name: impl Into<String>) -> Result<(), TrainingError> {
        let slot = self
            .slot(label)
            .inspect_err(|err| log_training_error(err, "rename_label"))?;
        self.names[slot] = name.into();
        self.dirty = true;
        Ok(())
    }

    pub fn label_name(&self, label: u32) -> Option<&str> {
        self.slot(label).ok().map(|slot| self.names[slot].as_str())
    }

    /// Number of samples under `label`; zero for labels outside the range
    pub fn num_samples_for_label(&self, label: u32) -> usize {
        self.slot(label).map(|slot| self.sets[slot].len()).unwrap_or(0)
    }

    pub fn total_samples(&self) -> usize {
        self.sets.iter().map(Vec::len).sum()
    }

    pub fn sample(&self, label: u32, index: usize) -> Option<&SampleMatrix> {
        self.slot(label).ok().and_then(|slot| self.sets[slot].get(index))
    }

    pub fn samples(&self, label: u32) -> &[SampleMatrix] {
        match self.slot(label) {
            Ok(slot) => &self.sets[slot],
            Err(_) => &[],
        }
    }

    /// Flattened snapshot of every sample in label order, built at call time
    pub fn all_data(&self) -> TimeSeriesClassificationData {
        let mut data = TimeSeriesClassificationData::new(self.num_dimensions, TRAINING_DATASET_NAME);
        for (slot, set) in self.sets.iter().enumerate() {
            let label = slot as u32 + 1;
            data.set_class_name(label, self.names[slot].clone());
            for sample in set {
                data.samples.push(ClassifiedSample {
                    label,
                    data: sample.clone(),
                });
            }
        }
        data
    }

    /// Replace the store's contents with a loaded dataset
    ///
    /// The dataset is fully validated first; on any error the store is not
    /// modified. Labels without a name in `data` fall back to their default.
    pub fn replace_with(&mut self, data: TimeSeriesClassificationData) -> Result<(), TrainingError> {
        if data.num_dimensions != self.num_dimensions {
            return Err(TrainingError::DimensionMismatch {
                expected: self.num_dimensions,
                actual: data.num_dimensions,
            });
        }
        for sample in &data.samples {
            self.slot(sample.label)?;
            self.check_sample(&sample.data)?;
        }

        let mut sets = vec![Vec::new(); self.max_labels as usize];
        for sample in data.samples {
            sets[(sample.label - 1) as usize].push(sample.data);
        }
        let names = (1..=self.max_labels)
            .map(|label| {
                data.class_names
                    .get(&label)
                    .cloned()
                    .unwrap_or_else(|| default_label_name(label))
            })
            .collect();

        self.sets = sets;
        self.names = names;
        self.dirty = false;
        Ok(())
    }
}

fn default_label_name(label: u32) -> String {
    format!("Label {}", label)
}
