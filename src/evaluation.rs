// TestEvaluator - held-out test predictions and training-data scoring
//
// The test dataset is one raw recording plus a parallel array of predicted
// labels (0 = no prediction). The array is rebuilt to the recording's length
// on every evaluation, never patched in place.

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineRunner;
use crate::training::data::SampleMatrix;
use crate::training::store::TrainingSampleStore;

/// Held-out recording and its latest predictions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestDataset {
    data: Option<SampleMatrix>,
    predictions: Vec<u32>,
}

impl TestDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recording wholesale; predictions reset to all zeros
    pub fn replace(&mut self, data: SampleMatrix) {
        self.predictions = vec![0; data.num_rows()];
        self.data = Some(data);
    }

    pub fn clear(&mut self) {
        self.data = None;
        self.predictions.clear();
    }

    pub fn data(&self) -> Option<&SampleMatrix> {
        self.data.as_ref()
    }

    pub fn predictions(&self) -> &[u32] {
        &self.predictions
    }

    pub fn num_rows(&self) -> usize {
        self.data.as_ref().map(SampleMatrix::num_rows).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Predict every row with the current pipeline
    ///
    /// Rows are predicted independently: the engine is reset before each row
    /// and once more afterwards so the live stream starts clean. An untrained
    /// pipeline yields all zeros, as does a row whose prediction fails.
    pub fn run_prediction(&mut self, runner: &mut PipelineRunner) {
        let rows = self.num_rows();
        self.predictions = vec![0; rows];

        let Some(data) = &self.data else {
            return;
        };
        if !runner.is_trained() {
            return;
        }

        for (slot, row) in self.predictions.iter_mut().zip(data.rows()) {
            runner.reset();
            *slot = runner.predict(row).map(|p| p.label).unwrap_or(0);
        }
        runner.reset();
        tracing::debug!("[TestEvaluator] Predicted {} test rows", rows);
    }

    /// Rows (and predictions when trained) for a selection, or the whole set
    ///
    /// Empty, reversed, out-of-range or narrower-than-`min_rows` selections
    /// show the whole recording.
    pub fn window(
        &self,
        selection: Option<(usize, usize)>,
        min_rows: usize,
        trained: bool,
        label_name: impl Fn(u32) -> Option<String>,
    ) -> TestWindow {
        let rows = self.num_rows();
        let (start, end) = match selection {
            Some((s, e)) if s < e && e <= rows && e - s >= min_rows => (s, e),
            _ => (0, rows),
        };

        let data = self
            .data
            .as_ref()
            .map(|d| (start..end).filter_map(|i| d.row(i).map(<[f64]>::to_vec)).collect())
            .unwrap_or_default();

        let (predictions, label_names) = if trained {
            let predictions: Vec<u32> = self.predictions.get(start..end).unwrap_or_default().to_vec();
            let names = predictions
                .iter()
                .map(|&label| match label {
                    0 => String::new(),
                    _ => label_name(label).unwrap_or_default(),
                })
                .collect();
            (Some(predictions), Some(names))
        } else {
            (None, None)
        };

        TestWindow {
            start,
            end,
            rows: data,
            predictions,
            label_names,
        }
    }
}

/// Slice of the test set prepared for presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestWindow {
    pub start: usize,
    pub end: usize,
    pub rows: Vec<Vec<f64>>,
    pub predictions: Option<Vec<u32>>,
    pub label_names: Option<Vec<String>>,
}

/// Summed class likelihoods of one training sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleScore {
    pub label: u32,
    /// Position within the label's set
    pub index: usize,
    /// Parallel to `class_labels`
    pub likelihood_sums: Vec<f64>,
    pub class_labels: Vec<u32>,
}

impl SampleScore {
    /// Class with the largest summed likelihood
    pub fn best_label(&self) -> Option<u32> {
        self.likelihood_sums
            .iter()
            .zip(&self.class_labels)
            .max_by(|a, b| a.0.total_cmp(b.0))
            .map(|(_, label)| *label)
    }
}

/// Run every training sample through the trained pipeline
///
/// Each row's class likelihoods are summed per sample; the engine is reset
/// between samples. Returns nothing for an untrained pipeline.
pub fn score_training_data(runner: &mut PipelineRunner, store: &TrainingSampleStore) -> Vec<SampleScore> {
    if !runner.is_trained() {
        return Vec::new();
    }
    let class_labels = runner.engine().class_labels();

    let mut scores = Vec::new();
    for label in 1..=store.max_labels() {
        for (index, sample) in store.samples(label).iter().enumerate() {
            runner.reset();
            let mut sums = vec![0.0; class_labels.len()];
            for row in sample.rows() {
                if let Ok(prediction) = runner.predict(row) {
                    for (acc, l) in sums.iter_mut().zip(&prediction.likelihoods) {
                        *acc += l;
                    }
                }
            }
            log::info!("sample {} (class {}): {:?}", index, label, sums);
            scores.push(SampleScore {
                label,
                index,
                likelihood_sums: sums,
                class_labels: class_labels.clone(),
            });
        }
    }
    runner.reset();
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedEngine;

    fn recording(rows: usize) -> SampleMatrix {
        SampleMatrix::from_rows(1, (0..rows).map(|i| vec![i as f64]).collect()).unwrap()
    }

    #[test]
    fn test_untrained_pipeline_yields_zeros() {
        let mut runner = PipelineRunner::new(Box::new(ScriptedEngine::new(1)), 32);
        let mut test = TestDataset::new();
        test.replace(recording(50));
        test.run_prediction(&mut runner);
        assert_eq!(test.predictions(), vec![0; 50].as_slice());
    }

    #[test]
    fn test_trained_pipeline_predicts_each_row() {
        let engine = ScriptedEngine::new(1)
            .trained()
            .predicting(|row| if row[0] >= 5.0 { 2 } else { 1 });
        let mut runner = PipelineRunner::new(Box::new(engine), 32);
        let mut test = TestDataset::new();
        test.replace(recording(8));
        test.run_prediction(&mut runner);
        assert_eq!(test.predictions(), &[1, 1, 1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_predictions_follow_current_length() {
        let mut runner = PipelineRunner::new(Box::new(ScriptedEngine::new(1).trained()), 32);
        let mut test = TestDataset::new();
        test.replace(recording(20));
        test.run_prediction(&mut runner);
        assert_eq!(test.predictions().len(), 20);

        test.replace(recording(5));
        test.run_prediction(&mut runner);
        assert_eq!(test.predictions().len(), 5);
    }

    #[test]
    fn test_window_selection_and_names() {
        let engine = ScriptedEngine::new(1)
            .trained()
            .predicting(|row| if row[0] < 3.0 { 0 } else { 2 });
        let mut runner = PipelineRunner::new(Box::new(engine), 32);
        let mut test = TestDataset::new();
        test.replace(recording(30));
        test.run_prediction(&mut runner);

        let names = |label: u32| Some(format!("Class {}", label));
        let narrow = test.window(Some((0, 4)), 10, true, names);
        assert_eq!((narrow.start, narrow.end), (0, 30));

        let wide = test.window(Some((0, 12)), 10, true, names);
        assert_eq!(wide.rows.len(), 12);
        let labels = wide.label_names.unwrap();
        assert_eq!(labels[0], "");
        assert_eq!(labels[5], "Class 2");

        let untrained = test.window(None, 10, false, names);
        assert!(untrained.predictions.is_none());
    }

    #[test]
    fn test_reversed_or_empty_window_shows_whole_set() {
        let engine = ScriptedEngine::new(1).trained().predicting(|_| 1);
        let mut runner = PipelineRunner::new(Box::new(engine), 32);
        let mut test = TestDataset::new();
        test.replace(recording(30));
        test.run_prediction(&mut runner);

        for selection in [(20, 5), (7, 7)] {
            let window = test.window(Some(selection), 0, true, |_| None);
            assert_eq!((window.start, window.end), (0, 30));
            assert_eq!(window.rows.len(), 30);
            assert_eq!(window.predictions.map(|p| p.len()), Some(30));
        }
        let one = test.window(Some((4, 5)), 0, true, |_| None);
        assert_eq!(one.rows.len(), 1);
    }

    #[test]
    fn test_score_training_data_sums_likelihoods() {
        let mut store = TrainingSampleStore::new(1, 9, 10);
        store.add_sample(1, recording(12)).unwrap();
        store.add_sample(2, recording(12)).unwrap();

        let engine = ScriptedEngine::new(1).trained().predicting(|_| 2);
        let mut runner = PipelineRunner::new(Box::new(engine), 32);
        let scores = score_training_data(&mut runner, &store);

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].label, 1);
        assert_eq!(scores[0].likelihood_sums, vec![0.0, 12.0]);
        assert_eq!(scores[0].best_label(), Some(2));
    }

    #[test]
    fn test_score_untrained_is_empty() {
        let store = TrainingSampleStore::new(1, 9, 10);
        let mut runner = PipelineRunner::new(Box::new(ScriptedEngine::new(1)), 32);
        assert!(score_training_data(&mut runner, &store).is_empty());
    }
}
