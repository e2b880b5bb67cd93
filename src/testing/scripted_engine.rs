//! Scripted pipeline engine for deterministic orchestration tests.
//!
//! Every behaviour the session cares about (stage shapes, preprocessing
//! failures, prediction labels, training outcome and duration) is set up
//! front. Forks share the call counters so a test can observe runs that
//! happened on a worker thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pipeline::{ClassifierCategory, PipelineEngine};
use crate::training::data::TimeSeriesClassificationData;

type RowPredicate = Arc<dyn Fn(&[f64]) -> bool + Send + Sync>;
type RowLabeler = Arc<dyn Fn(&[f64]) -> u32 + Send + Sync>;

/// How `train` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainBehavior {
    Succeed,
    Fail,
    Panic,
}

/// Calls observed across the engine and all of its forks
#[derive(Debug, Default)]
pub struct EngineCalls {
    train_calls: AtomicUsize,
    predict_calls: AtomicUsize,
    reset_calls: AtomicUsize,
    trained_sample_counts: Mutex<Vec<usize>>,
}

impl EngineCalls {
    pub fn train_calls(&self) -> usize {
        self.train_calls.load(Ordering::SeqCst)
    }

    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
    }

    /// Number of samples in each dataset passed to `train`, in call order
    pub fn trained_sample_counts(&self) -> Vec<usize> {
        self.trained_sample_counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct ScriptedEngine {
    dimensions: usize,
    preprocessing_stages: usize,
    feature_stages: usize,
    feature_width: Option<usize>,
    fail_preprocess: Option<RowPredicate>,
    labeler: Option<RowLabeler>,
    category: ClassifierCategory,
    classifier: bool,
    train_behavior: TrainBehavior,
    train_delay: Duration,
    trained: bool,
    class_labels: Vec<u32>,
    last: Vec<f64>,
    predicted: u32,
    calls: Arc<EngineCalls>,
}

impl ScriptedEngine {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            preprocessing_stages: 1,
            feature_stages: 1,
            feature_width: None,
            fail_preprocess: None,
            labeler: None,
            category: ClassifierCategory::Unknown,
            classifier: true,
            train_behavior: TrainBehavior::Succeed,
            train_delay: Duration::ZERO,
            trained: false,
            class_labels: Vec::new(),
            last: Vec::new(),
            predicted: 0,
            calls: Arc::new(EngineCalls::default()),
        }
    }

    pub fn with_stages(mut self, preprocessing: usize, features: usize) -> Self {
        self.preprocessing_stages = preprocessing;
        self.feature_stages = features;
        self
    }

    /// Feature stages emit vectors of `width` values instead of the row width
    pub fn with_feature_width(mut self, width: usize) -> Self {
        self.feature_width = Some(width);
        self
    }

    pub fn failing_preprocess_when(
        mut self,
        predicate: impl Fn(&[f64]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.fail_preprocess = Some(Arc::new(predicate));
        self
    }

    /// Label returned by `predict`; defaults to `1` for every row
    pub fn predicting(mut self, labeler: impl Fn(&[f64]) -> u32 + Send + Sync + 'static) -> Self {
        self.labeler = Some(Arc::new(labeler));
        self
    }

    pub fn with_category(mut self, category: ClassifierCategory) -> Self {
        self.category = category;
        self
    }

    pub fn without_classifier(mut self) -> Self {
        self.classifier = false;
        self
    }

    pub fn with_train_behavior(mut self, behavior: TrainBehavior) -> Self {
        self.train_behavior = behavior;
        self
    }

    /// `train` sleeps this long before returning
    pub fn with_train_delay(mut self, delay: Duration) -> Self {
        self.train_delay = delay;
        self
    }

    /// Start out trained on labels 1 and 2
    pub fn trained(mut self) -> Self {
        self.trained = true;
        self.class_labels = vec![1, 2];
        self
    }

    pub fn calls(&self) -> Arc<EngineCalls> {
        Arc::clone(&self.calls)
    }

    fn stage_vector(&self, offset: f64) -> Vec<f64> {
        match self.feature_width {
            Some(width) => vec![self.last.iter().sum::<f64>() + offset; width],
            None => self.last.iter().map(|v| v + offset).collect(),
        }
    }
}

impl PipelineEngine for ScriptedEngine {
    fn num_preprocessing_stages(&self) -> usize {
        self.preprocessing_stages
    }

    fn num_feature_stages(&self) -> usize {
        self.feature_stages
    }

    fn preprocess(&mut self, sample: &[f64]) -> bool {
        if sample.len() != self.dimensions {
            return false;
        }
        if let Some(fail) = &self.fail_preprocess {
            if fail(sample) {
                return false;
            }
        }
        self.last = sample.to_vec();
        true
    }

    fn preprocessed_data(&self, stage: usize) -> Vec<f64> {
        if stage >= self.preprocessing_stages {
            return Vec::new();
        }
        self.last.iter().map(|v| v + stage as f64).collect()
    }

    /// Feature stage `k` emits the row shifted by `k` (identity for stage 0)
    fn feature_data(&self, stage: usize) -> Vec<f64> {
        if stage >= self.feature_stages {
            return Vec::new();
        }
        self.stage_vector(stage as f64)
    }

    fn predict(&mut self, sample: &[f64]) -> bool {
        self.calls.predict_calls.fetch_add(1, Ordering::SeqCst);
        if !self.trained || !self.preprocess(sample) {
            return false;
        }
        self.predicted = match &self.labeler {
            Some(labeler) => labeler(sample),
            None => 1,
        };
        true
    }

    fn predicted_class_label(&self) -> u32 {
        self.predicted
    }

    /// One-hot over the trained labels
    fn class_likelihoods(&self) -> Vec<f64> {
        self.class_labels
            .iter()
            .map(|label| if *label == self.predicted { 1.0 } else { 0.0 })
            .collect()
    }

    fn class_distances(&self) -> Vec<f64> {
        self.class_labels
            .iter()
            .map(|label| if *label == self.predicted { 0.0 } else { 1.0 })
            .collect()
    }

    fn class_labels(&self) -> Vec<u32> {
        self.class_labels.clone()
    }

    fn train(&mut self, data: &TimeSeriesClassificationData) -> bool {
        self.calls.train_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut counts) = self.calls.trained_sample_counts.lock() {
            counts.push(data.num_samples());
        }
        if !self.train_delay.is_zero() {
            std::thread::sleep(self.train_delay);
        }

        match self.train_behavior {
            TrainBehavior::Panic => panic!("scripted training panic"),
            TrainBehavior::Fail => false,
            TrainBehavior::Succeed => {
                let mut labels: Vec<u32> = data.iter().map(|s| s.label).collect();
                labels.sort_unstable();
                labels.dedup();
                self.class_labels = labels;
                self.trained = true;
                true
            }
        }
    }

    fn reset(&mut self) {
        self.calls.reset_calls.fetch_add(1, Ordering::SeqCst);
        self.last.clear();
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn has_classifier(&self) -> bool {
        self.classifier
    }

    fn classifier_category(&self) -> ClassifierCategory {
        self.category
    }

    fn fork(&self) -> Box<dyn PipelineEngine> {
        Box::new(self.clone())
    }
}
