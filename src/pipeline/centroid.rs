// CentroidEngine - small nearest-centroid reference pipeline
//
// One moving-average preprocessing stage, one identity feature stage and a
// nearest-centroid classifier over per-row feature vectors. Every row of every
// training sample contributes to its class centroid. An optional rejection
// radius turns far-away rows into label 0 ("no confident class").
//
// This is a stand-in for a real classification toolkit, used by the CLI and
// tests. It is not meant to be a good classifier.

use std::collections::{BTreeMap, VecDeque};

use crate::pipeline::{ClassifierCategory, PipelineEngine};
use crate::training::data::TimeSeriesClassificationData;

/// Reference engine: moving average -> identity features -> nearest centroid
#[derive(Debug, Clone)]
pub struct CentroidEngine {
    dimensions: usize,
    window: usize,
    history: VecDeque<Vec<f64>>,
    smoothed: Vec<f64>,
    classifier: bool,
    rejection_radius: Option<f64>,
    centroids: Vec<(u32, Vec<f64>)>,
    predicted: u32,
    distances: Vec<f64>,
    likelihoods: Vec<f64>,
}

impl CentroidEngine {
    /// # Arguments
    /// * `dimensions` - Row width the engine accepts
    /// * `window` - Moving-average length in rows (clamped to at least 1)
    pub fn new(dimensions: usize, window: usize) -> Self {
        Self {
            dimensions,
            window: window.max(1),
            history: VecDeque::new(),
            smoothed: Vec::new(),
            classifier: true,
            rejection_radius: None,
            centroids: Vec::new(),
            predicted: 0,
            distances: Vec::new(),
            likelihoods: Vec::new(),
        }
    }

    /// Drop the classifier stage, leaving a signal-processing-only pipeline
    pub fn without_classifier(mut self) -> Self {
        self.classifier = false;
        self
    }

    /// Rows farther than `radius` from every centroid predict label 0
    pub fn with_rejection_radius(mut self, radius: f64) -> Self {
        self.rejection_radius = Some(radius);
        self
    }

    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

impl PipelineEngine for CentroidEngine {
    fn num_preprocessing_stages(&self) -> usize {
        1
    }

    fn num_feature_stages(&self) -> usize {
        1
    }

    fn preprocess(&mut self, sample: &[f64]) -> bool {
        if sample.len() != self.dimensions || sample.iter().any(|v| !v.is_finite()) {
            return false;
        }
        self.history.push_back(sample.to_vec());
        while self.history.len() > self.window {
            self.history.pop_front();
        }

        let count = self.history.len() as f64;
        self.smoothed = (0..self.dimensions)
            .map(|k| self.history.iter().map(|row| row[k]).sum::<f64>() / count)
            .collect();
        true
    }

    fn preprocessed_data(&self, stage: usize) -> Vec<f64> {
        if stage == 0 {
            self.smoothed.clone()
        } else {
            Vec::new()
        }
    }

    fn feature_data(&self, stage: usize) -> Vec<f64> {
        self.preprocessed_data(stage)
    }

    fn predict(&mut self, sample: &[f64]) -> bool {
        if !self.is_trained() || !self.preprocess(sample) {
            return false;
        }

        self.distances = self
            .centroids
            .iter()
            .map(|(_, centroid)| Self::distance(&self.smoothed, centroid))
            .collect();

        let inverse: Vec<f64> = self.distances.iter().map(|d| 1.0 / (d + 1e-9)).collect();
        let total: f64 = inverse.iter().sum();
        self.likelihoods = inverse.iter().map(|v| v / total).collect();

        let nearest = self
            .distances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1));
        self.predicted = match (nearest, self.rejection_radius) {
            (Some((_, d)), Some(radius)) if *d > radius => 0,
            (Some((i, _)), _) => self.centroids[i].0,
            (None, _) => 0,
        };
        true
    }

    fn predicted_class_label(&self) -> u32 {
        self.predicted
    }

    fn class_likelihoods(&self) -> Vec<f64> {
        self.likelihoods.clone()
    }

    fn class_distances(&self) -> Vec<f64> {
        self.distances.clone()
    }

    fn class_labels(&self) -> Vec<u32> {
        self.centroids.iter().map(|(label, _)| *label).collect()
    }

    fn train(&mut self, data: &TimeSeriesClassificationData) -> bool {
        if !self.classifier
            || data.num_samples() == 0
            || data.num_dimensions != self.dimensions
        {
            return false;
        }

        let mut sums: BTreeMap<u32, (Vec<f64>, usize)> = BTreeMap::new();
        for sample in data.iter() {
            let entry = sums
                .entry(sample.label)
                .or_insert_with(|| (vec![0.0; self.dimensions], 0));
            for row in sample.data.rows() {
                for (acc, v) in entry.0.iter_mut().zip(row) {
                    *acc += v;
                }
                entry.1 += 1;
            }
        }

        let centroids: Vec<(u32, Vec<f64>)> = sums
            .into_iter()
            .filter(|(_, (_, count))| *count > 0)
            .map(|(label, (sum, count))| {
                (label, sum.into_iter().map(|v| v / count as f64).collect())
            })
            .collect();
        if centroids.is_empty() {
            return false;
        }

        self.centroids = centroids;
        self.predicted = 0;
        self.distances.clear();
        self.likelihoods.clear();
        self.reset();
        true
    }

    fn reset(&mut self) {
        self.history.clear();
        self.smoothed.clear();
    }

    fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    fn has_classifier(&self) -> bool {
        self.classifier
    }

    fn classifier_category(&self) -> ClassifierCategory {
        if self.classifier {
            ClassifierCategory::Averaging
        } else {
            ClassifierCategory::Unknown
        }
    }

    fn fork(&self) -> Box<dyn PipelineEngine> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::data::SampleMatrix;

    fn dataset() -> TimeSeriesClassificationData {
        let mut data = TimeSeriesClassificationData::new(2, "TrainingData");
        data.add_sample(1, SampleMatrix::from_rows(2, vec![vec![0.0, 0.0]; 5]).unwrap())
            .unwrap();
        data.add_sample(2, SampleMatrix::from_rows(2, vec![vec![10.0, 10.0]; 5]).unwrap())
            .unwrap();
        data
    }

    #[test]
    fn test_moving_average_stage() {
        let mut engine = CentroidEngine::new(1, 2);
        assert!(engine.preprocess(&[2.0]));
        assert!(engine.preprocess(&[4.0]));
        assert!(engine.preprocess(&[8.0]));
        assert_eq!(engine.preprocessed_data(0), vec![6.0]);
        assert_eq!(engine.feature_data(0), vec![6.0]);
    }

    #[test]
    fn test_rejects_wrong_width_and_non_finite_rows() {
        let mut engine = CentroidEngine::new(2, 1);
        assert!(!engine.preprocess(&[1.0]));
        assert!(!engine.preprocess(&[1.0, f64::NAN]));
    }

    #[test]
    fn test_train_and_predict_nearest_centroid() {
        let mut engine = CentroidEngine::new(2, 1);
        assert!(!engine.is_trained());
        assert!(engine.train(&dataset()));
        assert_eq!(engine.class_labels(), vec![1, 2]);

        assert!(engine.predict(&[9.0, 9.5]));
        assert_eq!(engine.predicted_class_label(), 2);
        let likelihoods = engine.class_likelihoods();
        assert!(likelihoods[1] > likelihoods[0]);
        assert!((likelihoods.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejection_radius_predicts_zero() {
        let mut engine = CentroidEngine::new(2, 1).with_rejection_radius(1.0);
        engine.train(&dataset());
        assert!(engine.predict(&[5.0, 5.0]));
        assert_eq!(engine.predicted_class_label(), 0);
    }

    #[test]
    fn test_train_fails_on_empty_or_mismatched_data() {
        let mut engine = CentroidEngine::new(3, 1);
        assert!(!engine.train(&TimeSeriesClassificationData::new(3, "empty")));
        assert!(!engine.train(&dataset()));
        assert!(!engine.is_trained());
    }

    #[test]
    fn test_fork_is_independent() {
        let engine = CentroidEngine::new(2, 1);
        let mut forked = engine.fork();
        assert!(forked.train(&dataset()));
        assert!(forked.is_trained());
        assert!(!engine.is_trained());
    }

    #[test]
    fn test_signal_only_pipeline() {
        let mut engine = CentroidEngine::new(2, 1).without_classifier();
        assert!(!engine.has_classifier());
        assert!(!engine.train(&dataset()));
        assert_eq!(engine.classifier_category(), ClassifierCategory::Unknown);
    }
}
