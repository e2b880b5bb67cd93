// TrainingSession - tick-driven orchestration of the whole trainer
//
// The session owns every domain component and is driven from one thread:
//
//   producer thread --push--> SampleBuffer
//   tick(): drain buffer -> calibrate -> PipelineRunner -> sinks / recording
//           poll TrainingScheduler -> apply finished runs -> evaluate test set
//
// All structural edits to the training store happen here, on the tick
// thread, and go through the store API so cursors and dirty flags stay
// consistent. The training worker only ever sees a snapshot of the store.
//
// Nothing in here terminates the process: failures are logged, turned into
// status text and the previous state is kept.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::calibration::{CalibrateResult, Calibrator};
use crate::clock::{SystemTimeSource, TimeSource};
use crate::config::AppConfig;
use crate::error::{
    log_calibration_error, log_stream_error, log_training_error, CalibrationError, ErrorCode,
    PersistenceError, SessionError, StreamError, TrainingError,
};
use crate::evaluation::{score_training_data, SampleScore, TestDataset, TestWindow};
use crate::events::{DataKind, SessionEvent, SessionEvents};
use crate::persistence;
use crate::pipeline::{PipelineEngine, PipelineRunner, Prediction, SampleFeatures};
use crate::stream::{InputStream, OutputSink, SampleBuffer, VectorSink};
use crate::training::{
    CheckOutcome, SampleCursors, SampleMatrix, SchedulerState, TrainingReport,
    TrainingSampleChecker, TrainingSampleStore, TrainingScheduler, TrainingStatus,
};

/// Top-level application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Calibration,
    Pipeline,
    Training,
    Analysis,
}

/// Unsaved-change flags, one per dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSaves {
    pub calibration: bool,
    pub training: bool,
    pub test: bool,
}

impl PendingSaves {
    pub fn any(&self) -> bool {
        self.calibration || self.training || self.test
    }
}

/// What one tick did
#[derive(Debug, Default)]
pub struct TickReport {
    pub rows_processed: usize,
    /// Rows whose preprocessing failed (stage outputs kept from before)
    pub preprocess_failures: usize,
    /// Rows skipped because the calibrator is not ready
    pub uncalibrated_rows: usize,
    /// Confident predictions, in row order
    pub predictions: Vec<u32>,
    pub training_launched: Option<u64>,
    pub training_completed: Vec<TrainingReport>,
}

/// Where a finished recording ended up
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingOutcome {
    Calibrated { process: usize, result: CalibrateResult },
    SampleAdded { label: u32, index: usize },
    /// Recording was made in a mode that does not store it
    Discarded { rows: usize },
}

/// Result of each dataset saved during shutdown
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub training_joined: Option<TrainingReport>,
    pub saved: Vec<DataKind>,
    pub failed: Vec<(DataKind, PersistenceError)>,
}

pub struct TrainingSession {
    config: AppConfig,
    dimensions: usize,
    buffer: SampleBuffer,
    stream: Option<Box<dyn InputStream>>,
    calibrator: Option<Calibrator>,
    runner: PipelineRunner,
    store: TrainingSampleStore,
    cursors: SampleCursors,
    scheduler: TrainingScheduler,
    test: TestDataset,
    checker: Option<TrainingSampleChecker>,
    label_sinks: Vec<Box<dyn OutputSink>>,
    vector_sinks: Vec<Box<dyn VectorSink>>,
    events: SessionEvents,
    mode: Mode,
    status: String,
    is_recording: bool,
    recording: SampleMatrix,
    history: VecDeque<Vec<f64>>,
    extracted: Option<SampleMatrix>,
    calibration_dirty: bool,
    test_dirty: bool,
    scores: Vec<SampleScore>,
}

impl TrainingSession {
    /// Create a session on the system clock
    pub fn new(config: AppConfig, engine: Box<dyn PipelineEngine>) -> Self {
        Self::with_time_source(config, engine, Arc::new(SystemTimeSource::default()))
    }

    /// Create a session with an explicit time source for the training debounce
    pub fn with_time_source(
        config: AppConfig,
        engine: Box<dyn PipelineEngine>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let dimensions = config.stream.dimensions;
        let training = &config.training;
        let store = TrainingSampleStore::new(dimensions, training.max_labels, training.min_trim_rows);
        let cursors = SampleCursors::new(training.max_labels);
        let scheduler =
            TrainingScheduler::new(clock, Duration::from_millis(training.training_delay_ms));
        let runner = PipelineRunner::new(engine, training.too_many_features_threshold);

        tracing::info!(
            "[Session] Created: {} dimensions, {} labels",
            dimensions,
            training.max_labels
        );

        Self {
            dimensions,
            buffer: SampleBuffer::new(),
            stream: None,
            calibrator: None,
            runner,
            store,
            cursors,
            scheduler,
            test: TestDataset::new(),
            checker: None,
            label_sinks: Vec::new(),
            vector_sinks: Vec::new(),
            events: SessionEvents::new(),
            mode: Mode::Pipeline,
            status: String::new(),
            is_recording: false,
            recording: SampleMatrix::new(dimensions),
            history: VecDeque::new(),
            extracted: None,
            calibration_dirty: false,
            test_dirty: false,
            scores: Vec::new(),
            config,
        }
    }

    // ========================================================================
    // SETUP
    // ========================================================================

    /// Install a calibrator; the session starts in calibration mode until it is ready
    pub fn use_calibrator(&mut self, calibrator: Calibrator) -> Result<(), CalibrationError> {
        if calibrator.dimensions() != self.dimensions {
            return Err(CalibrationError::DimensionMismatch {
                expected: self.dimensions,
                actual: calibrator.dimensions(),
            });
        }
        let ready = calibrator.is_calibrated();
        self.calibrator = Some(calibrator);
        if !ready {
            self.set_mode(Mode::Calibration);
        }
        Ok(())
    }

    pub fn use_training_sample_checker(&mut self, checker: TrainingSampleChecker) {
        self.checker = Some(checker);
    }

    /// Register a label sink; returns false (and does not keep it) if it fails to start
    pub fn use_output_sink(&mut self, mut sink: Box<dyn OutputSink>) -> bool {
        if !sink.start() {
            log::warn!("Output sink failed to start; not registered");
            return false;
        }
        self.label_sinks.push(sink);
        true
    }

    pub fn use_vector_sink(&mut self, mut sink: Box<dyn VectorSink>) -> bool {
        if !sink.start() {
            log::warn!("Vector sink failed to start; not registered");
            return false;
        }
        self.vector_sinks.push(sink);
        true
    }

    /// Override the classifier-derived training advice
    pub fn use_training_data_advice(&mut self, advice: impl Into<String>) {
        self.runner.set_advice(advice);
    }

    /// Connect and start an input stream feeding this session's buffer
    pub fn attach_stream(&mut self, mut stream: Box<dyn InputStream>) -> Result<(), StreamError> {
        if stream.num_output_dimensions() != self.dimensions {
            let err = StreamError::DimensionMismatch {
                expected: self.dimensions,
                actual: stream.num_output_dimensions(),
            };
            log_stream_error(&err, "attach_stream");
            return Err(err);
        }

        let buffer = self.buffer.clone();
        stream.on_data_ready(Box::new(move |batch| match buffer.push(batch) {
            Ok(true) => tracing::debug!("[Session] Undrained batch overwritten"),
            Ok(false) => {}
            Err(err) => log_stream_error(&err, "on_data_ready"),
        }));
        stream.start().inspect_err(|err| log_stream_error(err, "attach_stream"))?;

        tracing::info!("[Session] Input stream started");
        self.stream = Some(stream);
        Ok(())
    }

    /// Producer-side handle to the pending-batch slot
    pub fn buffer(&self) -> SampleBuffer {
        self.buffer.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Process the pending batch and advance the training scheduler
    pub fn tick(&mut self) -> Result<TickReport, StreamError> {
        let mut report = TickReport::default();

        if let Some(batch) = self.buffer.take()? {
            for raw in &batch {
                self.process_row(raw, &mut report);
            }
        }

        let tick = self.scheduler.poll(&mut self.runner, &self.store);
        if let Some(generation) = tick.launched {
            self.events.publish(SessionEvent::TrainingStarted {
                generation,
                num_samples: self.store.total_samples(),
            });
        }
        for completed in &tick.completed {
            self.apply_training_report(completed);
        }
        report.training_launched = tick.launched;
        report.training_completed = tick.completed;
        Ok(report)
    }

    fn process_row(&mut self, raw: &[f64], report: &mut TickReport) {
        if raw.len() != self.dimensions {
            let err = StreamError::DimensionMismatch {
                expected: self.dimensions,
                actual: raw.len(),
            };
            log_stream_error(&err, "tick");
            return;
        }
        report.rows_processed += 1;

        let calibrated = match &self.calibrator {
            None => Some(raw.to_vec()),
            Some(calibrator) if calibrator.is_calibrated() => calibrator.calibrate(raw).ok(),
            Some(_) => None,
        };

        match &calibrated {
            Some(row) => self.run_pipeline(row, report),
            None => {
                report.uncalibrated_rows += 1;
                if self.mode != Mode::Calibration {
                    self.set_mode(Mode::Calibration);
                }
            }
        }

        self.push_history(calibrated.as_deref().unwrap_or(raw));

        if self.is_recording {
            let row = match (&calibrated, self.mode) {
                (Some(row), mode) if mode != Mode::Calibration => row.clone(),
                _ => raw.to_vec(),
            };
            if let Err(err) = self.recording.push_row(row) {
                log_training_error(&err, "recording");
            }
        }
    }

    fn run_pipeline(&mut self, row: &[f64], report: &mut TickReport) {
        let final_vector = match self.runner.process(row) {
            Ok(outputs) => outputs.final_vector.clone(),
            Err(_) => {
                report.preprocess_failures += 1;
                return;
            }
        };

        if !self.runner.has_classifier() {
            for sink in &mut self.vector_sinks {
                sink.on_receive(&final_vector);
            }
            return;
        }

        let Some(label) = self
            .runner
            .last_prediction()
            .filter(|p| p.is_confident())
            .map(|p| p.label)
        else {
            return;
        };
        for sink in &mut self.label_sinks {
            sink.on_receive(label);
        }
        report.predictions.push(label);
        let name = self.store.label_name(label).unwrap_or_default().to_string();
        self.events.publish(SessionEvent::Prediction { label, name });
    }

    fn push_history(&mut self, row: &[f64]) {
        self.history.push_back(row.to_vec());
        while self.history.len() > self.config.stream.history_rows {
            self.history.pop_front();
        }
    }

    fn apply_training_report(&mut self, report: &TrainingReport) {
        self.events.publish(SessionEvent::TrainingFinished {
            generation: report.generation,
            success: report.succeeded(),
        });
        match &report.status {
            TrainingStatus::Succeeded => {
                tracing::info!(
                    "[Session] Training run {} succeeded in {:?}",
                    report.generation,
                    report.elapsed
                );
                self.scores = score_training_data(&mut self.runner, &self.store);
                self.set_mode(Mode::Training);
                self.test.run_prediction(&mut self.runner);
                self.runner.reset();
                self.set_status("Training was successful");
            }
            TrainingStatus::Failed(err) => {
                self.set_status(err.message());
            }
            TrainingStatus::Superseded => {}
        }
    }

    // ========================================================================
    // MODE AND STATUS
    // ========================================================================

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.mode = mode;
            self.events.publish(SessionEvent::ModeChanged(mode));
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.events.publish(SessionEvent::Status(self.status.clone()));
    }

    /// Surface an error as status text; the result passes through
    fn reported<T, E: ErrorCode>(&mut self, result: Result<T, E>) -> Result<T, E> {
        if let Err(err) = &result {
            self.set_status(err.message());
        }
        result
    }

    /// Current training advice (user override or classifier category)
    pub fn training_data_advice(&self) -> String {
        self.runner.training_data_advice()
    }

    // ========================================================================
    // RECORDING
    // ========================================================================

    pub fn start_recording(&mut self) {
        self.recording = SampleMatrix::new(self.dimensions);
        self.is_recording = true;
    }

    pub fn stop_recording(&mut self) {
        self.is_recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Rows accumulated by the current or last recording
    pub fn recorded_rows(&self) -> usize {
        self.recording.num_rows()
    }

    /// Stop recording and route the sample according to the current mode
    ///
    /// Calibration mode feeds calibration process `label - 1`; training mode
    /// adds the sample to the store under `label`.
    pub fn finish_recording(&mut self, label: u32) -> Result<RecordingOutcome, SessionError> {
        self.stop_recording();
        let sample = std::mem::replace(&mut self.recording, SampleMatrix::new(self.dimensions));

        match self.mode {
            Mode::Calibration => {
                let process = (label as usize).checked_sub(1).ok_or(
                    CalibrationError::UnknownProcess {
                        index: 0,
                        count: self.calibrator.as_ref().map(Calibrator::num_processes).unwrap_or(0),
                    },
                )?;
                let result = self.calibrate_process(process, sample)?;
                Ok(RecordingOutcome::Calibrated { process, result })
            }
            Mode::Training => {
                let index = self.add_training_sample(label, sample)?;
                Ok(RecordingOutcome::SampleAdded { label, index })
            }
            Mode::Pipeline | Mode::Analysis => Ok(RecordingOutcome::Discarded {
                rows: sample.num_rows(),
            }),
        }
    }

    fn calibrate_process(&mut self, process: usize, sample: SampleMatrix) -> Result<CalibrateResult, SessionError> {
        let Some(calibrator) = self.calibrator.as_mut() else {
            let err = CalibrationError::NoCalibrator;
            log_calibration_error(&err, "finish_recording");
            return Err(err.into());
        };

        let outcome = calibrator.record(process, sample);
        let name = calibrator
            .process(process)
            .map(|p| p.name().to_string())
            .unwrap_or_default();
        match outcome {
            Ok(result) => {
                self.calibration_dirty = true;
                self.history.clear();
                self.set_status(format!("{} calibration: {}", name, result.message));
                self.events.publish(SessionEvent::CalibrationFitted {
                    process,
                    result: result.clone(),
                });
                if self.calibrator.as_ref().is_some_and(Calibrator::is_calibrated) {
                    self.set_mode(Mode::Pipeline);
                }
                Ok(result)
            }
            Err(err) => {
                self.set_status(format!("{} calibration: {}", name, err.message()));
                Err(err.into())
            }
        }
    }

    fn add_training_sample(&mut self, label: u32, sample: SampleMatrix) -> Result<usize, TrainingError> {
        if sample.is_empty() {
            let err = TrainingError::EmptyRecording;
            log_training_error(&err, "finish_recording");
            self.set_status(err.message());
            return Err(err);
        }

        if let Some(checker) = &self.checker {
            let result = checker(&sample);
            let title = self.store.label_name(label).unwrap_or_default().to_string();
            self.set_status(format!("{} check: {}", title, result.message));
            if result.outcome == CheckOutcome::Failure {
                let err = TrainingError::CheckFailed {
                    message: result.message,
                };
                log_training_error(&err, "finish_recording");
                return Err(err);
            }
        }

        let added = self.store.add_sample(label, sample);
        let index = self.reported(added)?;
        self.cursors.on_added(label, index);
        self.events.publish(SessionEvent::SampleAdded { label, index });
        Ok(index)
    }

    /// Replace the test dataset with the last recording and evaluate it
    pub fn record_test_data(&mut self) -> Result<usize, TrainingError> {
        self.stop_recording();
        let sample = std::mem::replace(&mut self.recording, SampleMatrix::new(self.dimensions));
        if sample.is_empty() {
            let err = TrainingError::EmptyRecording;
            log_training_error(&err, "record_test_data");
            return Err(err);
        }
        if let Some((row, column)) = sample.first_non_finite() {
            let err = TrainingError::NonFiniteValue { row, column };
            log_training_error(&err, "record_test_data");
            self.set_status(err.message());
            return Err(err);
        }
        let rows = sample.num_rows();
        self.replace_test_data(sample);
        self.test_dirty = true;
        Ok(rows)
    }

    fn replace_test_data(&mut self, data: SampleMatrix) {
        self.test.replace(data);
        self.test.run_prediction(&mut self.runner);
    }

    // ========================================================================
    // HISTORY EXTRACTION
    // ========================================================================

    /// Rows of recent live history, oldest first
    pub fn history(&self) -> impl Iterator<Item = &[f64]> {
        self.history.iter().map(Vec::as_slice)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Select history rows `[start, end)` for conversion into a training sample
    pub fn extract_history(&mut self, start: usize, end: usize) -> Result<usize, TrainingError> {
        if start >= end || end > self.history.len() {
            let err = TrainingError::InvalidRange {
                start,
                end,
                rows: self.history.len(),
            };
            log_training_error(&err, "extract_history");
            return Err(err);
        }
        let rows = self.history.range(start..end).cloned().collect();
        let sample = SampleMatrix::from_rows(self.dimensions, rows)?;
        let count = sample.num_rows();
        self.extracted = Some(sample);
        self.set_status("Press 1-9 to extract from live data to training data.");
        Ok(count)
    }

    pub fn has_pending_extraction(&self) -> bool {
        self.extracted.is_some()
    }

    /// Store the extracted selection under `label`
    pub fn finish_history_extraction(&mut self, label: u32) -> Result<usize, TrainingError> {
        let Some(sample) = self.extracted.take() else {
            return Err(TrainingError::EmptyRecording);
        };
        self.set_status("");
        let added = self.store.add_sample(label, sample);
        let index = self.reported(added)?;
        self.cursors.on_added(label, index);
        self.events.publish(SessionEvent::SampleAdded { label, index });
        Ok(index)
    }

    pub fn cancel_history_extraction(&mut self) {
        self.extracted = None;
        self.set_status("");
    }

    // ========================================================================
    // TRAINING DATA EDITS
    // ========================================================================

    pub fn store(&self) -> &TrainingSampleStore {
        &self.store
    }

    pub fn cursors(&self) -> &SampleCursors {
        &self.cursors
    }

    /// Sample currently shown for `label`
    pub fn shown_sample(&self, label: u32) -> Option<(usize, &SampleMatrix)> {
        let index = self.cursors.get(label)?;
        self.store.sample(label, index).map(|sample| (index, sample))
    }

    pub fn show_sample(&mut self, label: u32, index: usize) -> bool {
        self.cursors.set(&self.store, label, index)
    }

    pub fn delete_sample(&mut self, label: u32, index: usize) -> Result<SampleMatrix, TrainingError> {
        let result = self.store.delete_sample(label, index);
        let removed = self.reported(result)?;
        let remaining = self.store.num_samples_for_label(label);
        self.cursors.on_removed(label, index, remaining);
        self.events.publish(SessionEvent::SampleRemoved { label, index });
        Ok(removed)
    }

    /// Delete whichever sample is shown for `label`
    pub fn delete_shown_sample(&mut self, label: u32) -> Result<SampleMatrix, TrainingError> {
        let index = self.cursors.get(label).ok_or(TrainingError::IndexOutOfRange {
            label,
            index: 0,
            count: self.store.num_samples_for_label(label),
        })?;
        self.delete_sample(label, index)
    }

    pub fn trim_sample(&mut self, label: u32, index: usize, start: usize, end: usize) -> Result<(), TrainingError> {
        let result = self.store.trim_sample(label, index, start, end);
        self.reported(result)
    }

    /// Move a sample to the end of `target`; the target cursor shows it
    pub fn relabel_sample(&mut self, source: u32, index: usize, target: u32) -> Result<usize, TrainingError> {
        let result = self.store.relabel_sample(source, index, target);
        let target_index = self.reported(result)?;
        let remaining = self.store.num_samples_for_label(source);
        self.cursors
            .on_relabeled(source, index, remaining, target, target_index);
        self.events.publish(SessionEvent::SampleRemoved { label: source, index });
        self.events.publish(SessionEvent::SampleAdded {
            label: target,
            index: target_index,
        });
        Ok(target_index)
    }

    pub fn rename_label(&mut self, label: u32, name: impl Into<String>) -> Result<(), TrainingError> {
        let result = self.store.rename_label(label, name);
        self.reported(result)
    }

    /// Last-stage features of a stored sample
    pub fn sample_features(
        &mut self,
        label: u32,
        index: usize,
        selection: Option<(usize, usize)>,
    ) -> Result<SampleFeatures, SessionError> {
        let sample = self
            .store
            .sample(label, index)
            .cloned()
            .ok_or(TrainingError::IndexOutOfRange {
                label,
                index,
                count: self.store.num_samples_for_label(label),
            })?;
        let min_rows = self.store.min_trim_rows();
        Ok(self.runner.sample_features(&sample, selection, min_rows)?)
    }

    // ========================================================================
    // TRAINING AND EVALUATION
    // ========================================================================

    /// Schedule a debounced training run
    pub fn request_training(&mut self) {
        self.set_status("Training the model . . .");
        self.scheduler.request_training();
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Block until the in-flight training run (if any) has been applied
    pub fn wait_for_training(&mut self) -> Option<TrainingReport> {
        let report = self.scheduler.join(&mut self.runner)?;
        self.apply_training_report(&report);
        Some(report)
    }

    pub fn runner(&self) -> &PipelineRunner {
        &self.runner
    }

    pub fn is_trained(&self) -> bool {
        self.runner.is_trained()
    }

    pub fn last_prediction(&self) -> Option<&Prediction> {
        self.runner.last_prediction()
    }

    /// Per-sample scores from the last successful training run
    pub fn training_scores(&self) -> &[SampleScore] {
        &self.scores
    }

    pub fn test_data(&self) -> &TestDataset {
        &self.test
    }

    pub fn test_window(&self, selection: Option<(usize, usize)>) -> TestWindow {
        let store = &self.store;
        self.test.window(
            selection,
            store.min_trim_rows(),
            self.runner.is_trained(),
            |label| store.label_name(label).map(str::to_string),
        )
    }

    pub fn calibrator(&self) -> Option<&Calibrator> {
        self.calibrator.as_ref()
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    pub fn pending_saves(&self) -> PendingSaves {
        PendingSaves {
            calibration: self.calibration_dirty,
            training: self.store.is_dirty(),
            test: self.test_dirty,
        }
    }

    pub fn save_calibration(&mut self, path: &Path) -> Result<(), SessionError> {
        let calibrator = self.calibrator.as_ref().ok_or(CalibrationError::NoCalibrator)?;
        let result = persistence::save_calibration(path, calibrator);
        self.reported(result)?;
        self.calibration_dirty = false;
        self.events.publish(SessionEvent::Saved(DataKind::Calibration));
        Ok(())
    }

    /// Load calibration recordings and re-fit every process from them
    pub fn load_calibration(&mut self, path: &Path) -> Result<Vec<CalibrateResult>, SessionError> {
        let calibrator = self.calibrator.as_mut().ok_or(CalibrationError::NoCalibrator)?;
        let loaded = persistence::load_calibration(path, calibrator);
        let ready = calibrator.is_calibrated();
        let results = self.reported(loaded)?;

        self.history.clear();
        self.calibration_dirty = false;
        if ready && self.mode == Mode::Calibration {
            self.set_mode(Mode::Pipeline);
        }
        self.events.publish(SessionEvent::Loaded(DataKind::Calibration));
        Ok(results)
    }

    pub fn save_training(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let result = persistence::save_training(path, &self.store);
        self.reported(result)?;
        self.store.mark_saved();
        self.events.publish(SessionEvent::Saved(DataKind::Training));
        Ok(())
    }

    /// Replace the training data and schedule retraining
    pub fn load_training(&mut self, path: &Path) -> Result<usize, PersistenceError> {
        let result = persistence::load_training(path, &mut self.store);
        let count = self.reported(result)?;
        self.cursors.reset_to_last(&self.store);
        self.events.publish(SessionEvent::Loaded(DataKind::Training));
        self.request_training();
        Ok(count)
    }

    pub fn save_test(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let empty = SampleMatrix::new(self.dimensions);
        let data = self.test.data().unwrap_or(&empty);
        let result = persistence::save_test(path, data);
        self.reported(result)?;
        self.test_dirty = false;
        self.events.publish(SessionEvent::Saved(DataKind::Test));
        Ok(())
    }

    pub fn load_test(&mut self, path: &Path) -> Result<usize, PersistenceError> {
        let result = persistence::load_test(path, self.dimensions);
        let data = self.reported(result)?;
        let rows = data.num_rows();
        self.replace_test_data(data);
        self.test_dirty = false;
        self.events.publish(SessionEvent::Loaded(DataKind::Test));
        Ok(rows)
    }

    // ========================================================================
    // SHUTDOWN
    // ========================================================================

    /// Join training, stop the stream and save every dirty dataset
    ///
    /// A request still in its debounce window is dropped and the in-flight
    /// run is applied. Datasets go to the configured default paths. A failed
    /// save is reported and its dirty flag stays set.
    pub fn shutdown(&mut self) -> ShutdownReport {
        self.scheduler.cancel_pending();
        let mut report = ShutdownReport {
            training_joined: self.wait_for_training(),
            ..ShutdownReport::default()
        };

        if let Some(stream) = self.stream.as_mut() {
            stream.stop();
            tracing::info!("[Session] Input stream stopped");
        }

        let pending = self.pending_saves();
        let paths = self.config.persistence.clone();
        if pending.calibration {
            let result = self.save_calibration(&paths.calibration_path()).map_err(|e| match e {
                SessionError::Persistence(err) => err,
                other => PersistenceError::InvalidContent {
                    reason: other.message(),
                },
            });
            record_save(&mut report, DataKind::Calibration, result);
        }
        if pending.training {
            let result = self.save_training(&paths.training_path());
            record_save(&mut report, DataKind::Training, result);
        }
        if pending.test {
            let result = self.save_test(&paths.test_path());
            record_save(&mut report, DataKind::Test, result);
        }
        report
    }
}

fn record_save(report: &mut ShutdownReport, kind: DataKind, result: Result<(), PersistenceError>) {
    match result {
        Ok(()) => report.saved.push(kind),
        Err(err) => report.failed.push((kind, err)),
    }
}
