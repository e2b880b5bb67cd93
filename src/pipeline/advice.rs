// Classifier category and training-data advice lookup

use serde::{Deserialize, Serialize};

/// Broad family of the pipeline's classifier, reported by the engine itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifierCategory {
    /// Matches against the closest training sample (e.g. DTW)
    Distance,
    /// Models an average of the training data per class (e.g. ANBC)
    Averaging,
    /// Learns boundaries between classes (e.g. SVM)
    Margin,
    Unknown,
}

const ADVICE: &[(ClassifierCategory, &str)] = &[
    (
        ClassifierCategory::Distance,
        "This algorithm looks for the closest training sample. \
         As a result, you don't need a lot of training data but any \
         individual bad training sample can cause problems.",
    ),
    (
        ClassifierCategory::Averaging,
        "This algorithm uses an average of the training data. \
         As a result, recording additional training data can help the \
         performance of the algorithm. For each class, try to record \
         training data that represents the range of situations you want \
         to be recognized.",
    ),
    (
        ClassifierCategory::Margin,
        "This algorithm looks at the boundaries between the different \
         classes of training data. As a result, it can help to record \
         additional data at the boundaries between the different classes \
         you want to recognize.",
    ),
];

/// Advice text for a classifier category; empty for `Unknown`
pub fn training_data_advice(category: ClassifierCategory) -> &'static str {
    ADVICE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, text)| *text)
        .unwrap_or("")
}
