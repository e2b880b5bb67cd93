// Training module - labeled sample storage and background training
//
// - data: sample matrices and the flattened dataset handed to the engine
// - store: per-label sample collections with CRUD/relabel semantics
// - cursor: per-label "currently shown" sample positions
// - checker: optional quality gate for new recordings
// - scheduler: debounced, non-overlapping training runs

pub mod checker;
pub mod cursor;
pub mod data;
pub mod scheduler;
pub mod store;

pub use checker::{min_length_checker, CheckOutcome, TrainingSampleCheckResult, TrainingSampleChecker};
pub use cursor::SampleCursors;
pub use data::{ClassifiedSample, SampleMatrix, TimeSeriesClassificationData};
pub use scheduler::{SchedulerState, SchedulerTick, TrainingReport, TrainingScheduler, TrainingStatus};
pub use store::{TrainingSampleStore, TRAINING_DATASET_NAME};
