// Stream module - input and output collaborators around the tick loop
//
// - InputStream: a sensor-like source that delivers batches on its own thread
// - OutputSink / VectorSink: fire-and-forget consumers of predictions
// - SampleBuffer: the one piece of state shared between producer and tick
// - SyntheticStream: rand-driven source for the CLI and tests

pub mod buffer;
pub mod synthetic;

pub use buffer::{SampleBatch, SampleBuffer};
pub use synthetic::{SyntheticConfig, SyntheticGenerator, SyntheticStream};

use crate::error::StreamError;

/// Callback registered by the consumer; may be invoked from any thread
pub type DataReadyCallback = Box<dyn Fn(SampleBatch) + Send + Sync>;

/// Source of N-dimensional sample batches
pub trait InputStream: Send {
    /// Begin delivering batches to the registered callback
    fn start(&mut self) -> Result<(), StreamError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn num_output_dimensions(&self) -> usize;

    /// Per-dimension names for presentation
    fn labels(&self) -> Vec<String> {
        Vec::new()
    }

    /// Register the single consumer; replaces any previous registration
    fn on_data_ready(&mut self, callback: DataReadyCallback);
}

/// Receives the predicted label whenever a prediction is confident
pub trait OutputSink: Send {
    fn start(&mut self) -> bool {
        true
    }

    fn on_receive(&mut self, label: u32);
}

/// Receives the final stage vector of a pipeline without a classifier
pub trait VectorSink: Send {
    fn start(&mut self) -> bool {
        true
    }

    fn on_receive(&mut self, vector: &[f64]);
}
