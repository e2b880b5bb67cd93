// ESP Trainer Core - streaming-to-training orchestration
// Live sensor rows flow through calibration and a trainable pipeline; labelled
// recordings feed a debounced background trainer.

// Module declarations
pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod persistence;
pub mod pipeline;
pub mod session;
pub mod stream;
pub mod testing;
pub mod training;

// Re-exports for convenience
pub use calibration::{CalibrateResult, Calibrator};
pub use clock::{ManualClock, SystemTimeSource, TimeSource};
pub use config::AppConfig;
pub use error::{ErrorCode, SessionError};
pub use events::{DataKind, SessionEvent};
pub use pipeline::{CentroidEngine, PipelineEngine, PipelineRunner, Prediction};
pub use session::{Mode, PendingSaves, RecordingOutcome, ShutdownReport, TickReport, TrainingSession};
pub use stream::{InputStream, OutputSink, SampleBuffer, SyntheticStream, VectorSink};
pub use training::{SampleMatrix, TrainingSampleStore, TrainingScheduler};
