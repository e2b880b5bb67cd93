// PipelineRunner - per-tick orchestration around a PipelineEngine
//
// Each tick pushes one calibrated sample through the engine. The runner
// caches the latest per-stage outputs for presentation and, when the engine
// is trained, the latest prediction. A sample that fails preprocessing leaves
// the cached outputs untouched so no partial feature vector reaches a
// consumer.
//
// Wide feature vectors (at or above `too_many_features_threshold`) are exposed
// as a single aggregate vector instead of one scalar per dimension. This only
// changes presentation; the engine sees the same data either way.

use serde::{Deserialize, Serialize};

use crate::error::{log_pipeline_error, PipelineError};
use crate::pipeline::{training_data_advice, PipelineEngine};
use crate::training::data::SampleMatrix;

/// One classification produced on a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label; `0` means no confident class
    pub label: u32,
    pub likelihoods: Vec<f64>,
    pub distances: Vec<f64>,
    pub class_labels: Vec<u32>,
}

impl Prediction {
    /// True when the prediction names a class and should reach output sinks
    pub fn is_confident(&self) -> bool {
        self.label != 0
    }
}

/// Presentation shape of one feature stage's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureView {
    /// One scalar per feature dimension
    Scalars(Vec<f64>),
    /// Whole vector as one series (too many features to show individually)
    Aggregate(Vec<f64>),
}

impl FeatureView {
    pub fn values(&self) -> &[f64] {
        match self {
            FeatureView::Scalars(v) | FeatureView::Aggregate(v) => v,
        }
    }
}

/// Outputs of every stage for the most recent successful tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    pub preprocessed: Vec<Vec<f64>>,
    pub features: Vec<FeatureView>,
    /// Output of the last stage, or the input when the pipeline has no stages
    pub final_vector: Vec<f64>,
}

/// Per-row features of one stored sample, for the feature view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFeatures {
    pub rows: Vec<Vec<f64>>,
    /// (min, max) per feature dimension, or a single overall range when aggregated
    pub ranges: Vec<(f64, f64)>,
    pub aggregate: bool,
    /// Rows skipped because preprocessing failed
    pub skipped: usize,
}

/// Wraps the engine and exposes per-stage outputs for the current tick
pub struct PipelineRunner {
    engine: Box<dyn PipelineEngine>,
    too_many_features_threshold: usize,
    stages: StageOutputs,
    prediction: Option<Prediction>,
    advice_override: Option<String>,
}

impl PipelineRunner {
    pub fn new(engine: Box<dyn PipelineEngine>, too_many_features_threshold: usize) -> Self {
        Self {
            engine,
            too_many_features_threshold,
            stages: StageOutputs::default(),
            prediction: None,
            advice_override: None,
        }
    }

    pub fn engine(&self) -> &dyn PipelineEngine {
        self.engine.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.engine.is_trained()
    }

    pub fn has_classifier(&self) -> bool {
        self.engine.has_classifier()
    }

    pub fn too_many_features_threshold(&self) -> usize {
        self.too_many_features_threshold
    }

    /// Independent copy of the engine for an off-thread training run
    pub fn fork_engine(&self) -> Box<dyn PipelineEngine> {
        self.engine.fork()
    }

    /// Install a freshly trained engine, dropping cached outputs
    pub fn replace_engine(&mut self, engine: Box<dyn PipelineEngine>) {
        self.engine = engine;
        self.stages = StageOutputs::default();
        self.prediction = None;
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Latest stage outputs; stale when the last tick failed
    pub fn stage_outputs(&self) -> &StageOutputs {
        &self.stages
    }

    pub fn last_prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    /// Whether feature stage `stage` is presented as an aggregate vector
    pub fn is_aggregate_stage(&self, width: usize) -> bool {
        width >= self.too_many_features_threshold
    }

    /// Push one sample through the pipeline
    ///
    /// # Returns
    /// * `Ok(StageOutputs)` - Fresh stage outputs (prediction via `last_prediction`)
    /// * `Err(PipelineError)` - Preprocessing failed; cached outputs unchanged
    pub fn process(&mut self, sample: &[f64]) -> Result<&StageOutputs, PipelineError> {
        if !self.engine.preprocess(sample) {
            let err = PipelineError::PreprocessFailed;
            log_pipeline_error(&err, "process");
            return Err(err);
        }

        let mut outputs = StageOutputs {
            final_vector: sample.to_vec(),
            ..StageOutputs::default()
        };
        for stage in 0..self.engine.num_preprocessing_stages() {
            let data = self.engine.preprocessed_data(stage);
            outputs.final_vector = data.clone();
            outputs.preprocessed.push(data);
        }
        for stage in 0..self.engine.num_feature_stages() {
            let data = self.engine.feature_data(stage);
            outputs.final_vector = data.clone();
            outputs.features.push(self.feature_view(data));
        }
        self.stages = outputs;

        self.prediction = if self.engine.is_trained() {
            self.predict(sample).ok()
        } else {
            None
        };

        Ok(&self.stages)
    }

    fn feature_view(&self, data: Vec<f64>) -> FeatureView {
        if self.is_aggregate_stage(data.len()) {
            FeatureView::Aggregate(data)
        } else {
            FeatureView::Scalars(data)
        }
    }

    /// Classify one sample without touching cached stage outputs
    pub fn predict(&mut self, sample: &[f64]) -> Result<Prediction, PipelineError> {
        if !self.engine.is_trained() {
            return Err(PipelineError::NotTrained);
        }
        if !self.engine.predict(sample) {
            let err = PipelineError::PredictFailed;
            log_pipeline_error(&err, "predict");
            return Err(err);
        }
        Ok(Prediction {
            label: self.engine.predicted_class_label(),
            likelihoods: self.engine.class_likelihoods(),
            distances: self.engine.class_distances(),
            class_labels: self.engine.class_labels(),
        })
    }

    /// Flow a stored sample through the pipeline and collect last-stage features
    ///
    /// The engine is reset first so history from the live stream does not leak
    /// into the sample's features. When the features are aggregated and a
    /// selection of at least `min_rows` rows is given, only that range is used.
    pub fn sample_features(
        &mut self,
        sample: &SampleMatrix,
        selection: Option<(usize, usize)>,
        min_rows: usize,
    ) -> Result<SampleFeatures, PipelineError> {
        let num_stages = self.engine.num_feature_stages();
        if num_stages == 0 {
            return Err(PipelineError::NoFeatureStages);
        }
        self.engine.reset();

        let (start, end) = match selection {
            Some((s, e)) if s < e && e - s >= min_rows && e <= sample.num_rows() => (s, e),
            _ => (0, sample.num_rows()),
        };

        let mut features = SampleFeatures {
            rows: Vec::with_capacity(end - start),
            ranges: Vec::new(),
            aggregate: false,
            skipped: 0,
        };
        for row in (start..end).filter_map(|i| sample.row(i)) {
            if !self.engine.preprocess(row) {
                log_pipeline_error(&PipelineError::PreprocessFailed, "sample_features");
                features.skipped += 1;
                continue;
            }
            let feature = self.engine.feature_data(num_stages - 1);
            features.aggregate = self.is_aggregate_stage(feature.len());
            features.rows.push(feature);
        }
        self.engine.reset();

        features.ranges = feature_ranges(&features.rows, features.aggregate);
        Ok(features)
    }

    /// Override the category-derived advice with a fixed text
    pub fn set_advice(&mut self, advice: impl Into<String>) {
        self.advice_override = Some(advice.into());
    }

    /// Training-data advice for the current classifier
    pub fn training_data_advice(&self) -> String {
        if let Some(text) = &self.advice_override {
            return text.clone();
        }
        if !self.engine.has_classifier() {
            return String::new();
        }
        training_data_advice(self.engine.classifier_category()).to_string()
    }
}

fn feature_ranges(rows: &[Vec<f64>], aggregate: bool) -> Vec<(f64, f64)> {
    if aggregate {
        let overall = rows.iter().flatten().fold(None, |acc: Option<(f64, f64)>, &v| {
            Some(match acc {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            })
        });
        return overall.into_iter().collect();
    }

    let width = rows.first().map(Vec::len).unwrap_or(0);
    (0..width)
        .map(|k| {
            rows.iter()
                .filter_map(|row| row.get(k).copied())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                })
        })
        .collect()
}
