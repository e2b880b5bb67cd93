// Pipeline module - contract for the opaque classification pipeline
//
// The numerical internals of preprocessing, feature extraction and
// classification live behind `PipelineEngine`. This crate only orchestrates
// calls into it:
//
// - PipelineRunner: per-tick sample flow, stage outputs, predictions
// - advice: classifier-category driven training tips
// - CentroidEngine: small reference engine used by the CLI and tests

pub mod advice;
pub mod centroid;
pub mod runner;

pub use advice::{training_data_advice, ClassifierCategory};
pub use centroid::CentroidEngine;
pub use runner::{FeatureView, PipelineRunner, Prediction, SampleFeatures, StageOutputs};

use crate::training::data::TimeSeriesClassificationData;

/// Call contract of a multi-stage classification pipeline
///
/// Implementations own all stage state. Methods mirror a staged engine:
/// `preprocess` pushes one sample through the preprocessing and feature
/// stages and caches each stage's output; `predict` runs the whole chain
/// including the classifier.
pub trait PipelineEngine: Send {
    fn num_preprocessing_stages(&self) -> usize;

    fn num_feature_stages(&self) -> usize;

    /// Feed one sample through preprocessing and feature extraction
    fn preprocess(&mut self, sample: &[f64]) -> bool;

    /// Cached output of preprocessing stage `stage` for the last sample
    fn preprocessed_data(&self, stage: usize) -> Vec<f64>;

    /// Cached output of feature stage `stage` for the last sample
    fn feature_data(&self, stage: usize) -> Vec<f64>;

    fn predict(&mut self, sample: &[f64]) -> bool;

    /// Label of the last prediction; `0` means no confident class
    fn predicted_class_label(&self) -> u32;

    fn class_likelihoods(&self) -> Vec<f64>;

    fn class_distances(&self) -> Vec<f64>;

    /// Labels the classifier was trained on, parallel to likelihoods/distances
    fn class_labels(&self) -> Vec<u32>;

    fn num_classes(&self) -> usize {
        self.class_labels().len()
    }

    /// Synchronous, blocking fit on a full dataset
    fn train(&mut self, data: &TimeSeriesClassificationData) -> bool;

    /// Clear per-stream stage history (filters, buffers), keeping the model
    fn reset(&mut self);

    fn is_trained(&self) -> bool;

    /// False for signal-processing-only pipelines
    fn has_classifier(&self) -> bool {
        true
    }

    fn classifier_category(&self) -> ClassifierCategory {
        ClassifierCategory::Unknown
    }

    /// Independent copy used to train off the tick thread
    fn fork(&self) -> Box<dyn PipelineEngine>;
}
