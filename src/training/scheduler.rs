// TrainingScheduler - debounced, non-overlapping background training
//
// State machine driven from the tick thread:
//
//   Idle --request--> Scheduled(at = now + delay)
//   Scheduled --poll, now >= at--> Running   (joins any prior worker first)
//   Running --poll, worker finished--> Idle
//
// A worker trains a forked copy of the engine on a snapshot of the store taken
// at launch. The tick thread never shares the live engine with the worker; on
// success the trained fork replaces it, on failure the live engine is kept.
//
// There is no mid-run cancellation. Each launch records the request
// generation it serves; if another request arrives while it runs, its result
// is discarded when it completes and the newer run supersedes it. Cancelling
// that newer request before it launches makes the in-flight run current again.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::clock::TimeSource;
use crate::error::{log_training_error, TrainingError};
use crate::pipeline::{PipelineEngine, PipelineRunner};
use crate::training::store::TrainingSampleStore;

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled { at: Instant },
    Running,
    /// A run is in flight and another one is already queued behind it
    RunningWithPending { at: Instant },
}

/// How a finished run was applied
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingStatus {
    /// Trained engine installed in the runner
    Succeeded,
    /// Engine reported failure or the worker panicked; prior engine kept
    Failed(TrainingError),
    /// Run finished after a newer request; result dropped
    Superseded,
}

/// Summary of one completed training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub generation: u64,
    pub num_samples: usize,
    pub elapsed: Duration,
    pub status: TrainingStatus,
}

impl TrainingReport {
    pub fn succeeded(&self) -> bool {
        self.status == TrainingStatus::Succeeded
    }
}

/// What happened during one `poll`
#[derive(Debug, Default)]
pub struct SchedulerTick {
    /// Runs that completed (at most two: one joined before a relaunch)
    pub completed: Vec<TrainingReport>,
    /// Generation of a run launched on this tick
    pub launched: Option<u64>,
}

struct WorkerResult {
    engine: Option<Box<dyn PipelineEngine>>,
    elapsed: Duration,
}

struct InFlight {
    generation: u64,
    num_samples: usize,
    handle: JoinHandle<WorkerResult>,
}

pub struct TrainingScheduler {
    clock: Arc<dyn TimeSource>,
    delay: Duration,
    scheduled_at: Option<Instant>,
    /// Incremented on every request
    requested: u64,
    /// Generation served by the most recent launch
    last_launched: u64,
    in_flight: Option<InFlight>,
    runs_launched: u64,
}

impl TrainingScheduler {
    /// # Arguments
    /// * `clock` - Time source used for the debounce window
    /// * `delay` - Debounce between a request and the launch
    pub fn new(clock: Arc<dyn TimeSource>, delay: Duration) -> Self {
        Self {
            clock,
            delay,
            scheduled_at: None,
            requested: 0,
            last_launched: 0,
            in_flight: None,
            runs_launched: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match (self.scheduled_at, self.in_flight.is_some()) {
            (None, false) => SchedulerState::Idle,
            (Some(at), false) => SchedulerState::Scheduled { at },
            (None, true) => SchedulerState::Running,
            (Some(at), true) => SchedulerState::RunningWithPending { at },
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == SchedulerState::Idle
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Total runs launched since creation
    pub fn runs_launched(&self) -> u64 {
        self.runs_launched
    }

    /// Schedule a run `delay` from now
    ///
    /// Requests inside the debounce window push the trigger time back and
    /// collapse into one run.
    pub fn request_training(&mut self) {
        self.requested += 1;
        let at = self.clock.now() + self.delay;
        self.scheduled_at = Some(at);
        tracing::debug!(
            "[Scheduler] Training requested (generation {}), due in {:?}",
            self.requested,
            self.delay
        );
    }

    /// Drop a pending request that has not launched yet
    ///
    /// The in-flight run, if any, no longer has a successor and is applied
    /// when collected.
    pub fn cancel_pending(&mut self) {
        if self.scheduled_at.take().is_some() {
            tracing::debug!(
                "[Scheduler] Cancelled pending request (generation {})",
                self.requested
            );
            self.requested = self.last_launched;
        }
    }

    /// Advance the scheduler; call once per tick
    ///
    /// Collects a finished worker without blocking. When the debounce window
    /// has elapsed, joins any still-running worker (blocking for its tail) and
    /// launches a new one on a snapshot of `store`.
    pub fn poll(&mut self, runner: &mut PipelineRunner, store: &TrainingSampleStore) -> SchedulerTick {
        let mut tick = SchedulerTick::default();

        let finished = self
            .in_flight
            .as_ref()
            .map(|job| job.handle.is_finished())
            .unwrap_or(false);
        if finished {
            tick.completed.extend(self.collect(runner));
        }

        let due = matches!(self.scheduled_at, Some(at) if self.clock.now() >= at);
        if due {
            if self.in_flight.is_some() {
                tracing::info!("[Scheduler] Waiting for previous training run before relaunch");
                tick.completed.extend(self.collect(runner));
            }
            self.scheduled_at = None;
            tick.launched = Some(self.launch(runner, store));
        }

        tick
    }

    /// Block until the in-flight run (if any) finishes and apply it
    pub fn join(&mut self, runner: &mut PipelineRunner) -> Option<TrainingReport> {
        self.collect(runner)
    }

    fn launch(&mut self, runner: &PipelineRunner, store: &TrainingSampleStore) -> u64 {
        let generation = self.requested;
        self.last_launched = generation;
        let snapshot = store.all_data();
        let num_samples = snapshot.num_samples();
        let mut engine = runner.fork_engine();

        tracing::info!(
            "[Scheduler] Launching training run {} on {} samples",
            generation,
            num_samples
        );
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let trained = engine.train(&snapshot);
            let elapsed = started.elapsed();
            tracing::debug!(
                "[TrainingWorker] Run {} finished in {:?} (ok={})",
                generation,
                elapsed,
                trained
            );
            WorkerResult {
                engine: trained.then_some(engine),
                elapsed,
            }
        });

        self.in_flight = Some(InFlight {
            generation,
            num_samples,
            handle,
        });
        self.runs_launched += 1;
        generation
    }

    fn collect(&mut self, runner: &mut PipelineRunner) -> Option<TrainingReport> {
        let job = self.in_flight.take()?;
        let (status, elapsed) = match job.handle.join() {
            Ok(WorkerResult {
                engine: Some(engine),
                elapsed,
            }) => {
                if self.requested > job.generation {
                    tracing::info!(
                        "[Scheduler] Discarding run {}; generation {} requested since",
                        job.generation,
                        self.requested
                    );
                    (TrainingStatus::Superseded, elapsed)
                } else {
                    runner.replace_engine(engine);
                    (TrainingStatus::Succeeded, elapsed)
                }
            }
            Ok(WorkerResult {
                engine: None,
                elapsed,
            }) => {
                let err = TrainingError::TrainFailed;
                log_training_error(&err, "training worker");
                (TrainingStatus::Failed(err), elapsed)
            }
            Err(_) => {
                let err = TrainingError::WorkerPanicked;
                log_training_error(&err, "training worker");
                (TrainingStatus::Failed(err), Duration::ZERO)
            }
        };

        Some(TrainingReport {
            generation: job.generation,
            num_samples: job.num_samples,
            elapsed,
            status,
        })
    }
}

impl Drop for TrainingScheduler {
    fn drop(&mut self) {
        if let Some(job) = self.in_flight.take() {
            let _ = job.handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{ScriptedEngine, TrainBehavior};
    use crate::training::data::SampleMatrix;

    const DELAY: Duration = Duration::from_millis(50);

    fn store_with_samples(count: usize) -> TrainingSampleStore {
        let mut store = TrainingSampleStore::new(2, 9, 10);
        for i in 0..count {
            let rows = vec![vec![i as f64, 1.0]; 12];
            store
                .add_sample(1 + (i % 2) as u32, SampleMatrix::from_rows(2, rows).unwrap())
                .unwrap();
        }
        store
    }

    fn setup(engine: ScriptedEngine) -> (Arc<ManualClock>, TrainingScheduler, PipelineRunner) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = TrainingScheduler::new(clock.clone(), DELAY);
        let runner = PipelineRunner::new(Box::new(engine), 32);
        (clock, scheduler, runner)
    }

    fn run_to_idle(scheduler: &mut TrainingScheduler, runner: &mut PipelineRunner) -> TrainingReport {
        scheduler.join(runner).expect("a run was in flight")
    }

    #[test]
    fn test_does_not_launch_before_delay() {
        let engine = ScriptedEngine::new(2);
        let calls = engine.calls();
        let (clock, mut scheduler, mut runner) = setup(engine);
        let store = store_with_samples(2);

        scheduler.request_training();
        assert!(matches!(scheduler.state(), SchedulerState::Scheduled { .. }));

        clock.advance(Duration::from_millis(49));
        assert!(scheduler.poll(&mut runner, &store).launched.is_none());
        assert_eq!(calls.train_calls(), 0);

        clock.advance(Duration::from_millis(1));
        assert_eq!(scheduler.poll(&mut runner, &store).launched, Some(1));
        let report = run_to_idle(&mut scheduler, &mut runner);
        assert!(report.succeeded());
        assert_eq!(report.num_samples, 2);
        assert!(runner.is_trained());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_requests_within_window_collapse_to_one_run() {
        let engine = ScriptedEngine::new(2);
        let calls = engine.calls();
        let (clock, mut scheduler, mut runner) = setup(engine);
        let store = store_with_samples(3);

        scheduler.request_training();
        clock.advance(Duration::from_millis(20));
        scheduler.request_training();
        clock.advance(Duration::from_millis(40));
        assert!(scheduler.poll(&mut runner, &store).launched.is_none());

        clock.advance(Duration::from_millis(10));
        assert!(scheduler.poll(&mut runner, &store).launched.is_some());
        run_to_idle(&mut scheduler, &mut runner);

        clock.advance(Duration::from_secs(1));
        assert!(scheduler.poll(&mut runner, &store).launched.is_none());
        assert_eq!(calls.train_calls(), 1);
        assert_eq!(scheduler.runs_launched(), 1);
    }

    #[test]
    fn test_failed_training_keeps_prior_engine() {
        let engine = ScriptedEngine::new(2).with_train_behavior(TrainBehavior::Fail);
        let (clock, mut scheduler, mut runner) = setup(engine);
        let store = store_with_samples(2);

        scheduler.request_training();
        clock.advance(DELAY);
        scheduler.poll(&mut runner, &store);
        let report = run_to_idle(&mut scheduler, &mut runner);

        assert_eq!(report.status, TrainingStatus::Failed(TrainingError::TrainFailed));
        assert!(!runner.is_trained());
    }

    #[test]
    fn test_worker_panic_is_reported_not_propagated() {
        let engine = ScriptedEngine::new(2).with_train_behavior(TrainBehavior::Panic);
        let (clock, mut scheduler, mut runner) = setup(engine);
        let store = store_with_samples(1);

        scheduler.request_training();
        clock.advance(DELAY);
        scheduler.poll(&mut runner, &store);
        let report = run_to_idle(&mut scheduler, &mut runner);

        assert_eq!(report.status, TrainingStatus::Failed(TrainingError::WorkerPanicked));
        assert!(!runner.is_trained());
    }

    #[test]
    fn test_worker_trains_on_snapshot_taken_at_launch() {
        let engine = ScriptedEngine::new(2).with_train_delay(Duration::from_millis(30));
        let calls = engine.calls();
        let (clock, mut scheduler, mut runner) = setup(engine);
        let mut store = store_with_samples(2);

        scheduler.request_training();
        clock.advance(DELAY);
        scheduler.poll(&mut runner, &store);

        let extra = SampleMatrix::from_rows(2, vec![vec![9.0, 9.0]; 12]).unwrap();
        store.add_sample(3, extra).unwrap();
        run_to_idle(&mut scheduler, &mut runner);

        assert_eq!(calls.trained_sample_counts(), vec![2]);
    }

    #[test]
    fn test_request_while_running_joins_then_relaunches() {
        let engine = ScriptedEngine::new(2).with_train_delay(Duration::from_millis(40));
        let calls = engine.calls();
        let (clock, mut scheduler, mut runner) = setup(engine);
        let mut store = store_with_samples(2);

        scheduler.request_training();
        clock.advance(DELAY);
        assert_eq!(scheduler.poll(&mut runner, &store).launched, Some(1));

        store
            .add_sample(2, SampleMatrix::from_rows(2, vec![vec![0.5, 0.5]; 12]).unwrap())
            .unwrap();
        scheduler.request_training();
        assert!(matches!(
            scheduler.state(),
            SchedulerState::RunningWithPending { .. }
        ));

        clock.advance(DELAY);
        let tick = scheduler.poll(&mut runner, &store);
        assert_eq!(tick.launched, Some(2));
        assert_eq!(tick.completed.len(), 1);
        assert_eq!(tick.completed[0].status, TrainingStatus::Superseded);

        let report = run_to_idle(&mut scheduler, &mut runner);
        assert!(report.succeeded());
        assert_eq!(report.generation, 2);
        assert_eq!(calls.train_calls(), 2);
        assert_eq!(calls.trained_sample_counts(), vec![2, 3]);
    }

    #[test]
    fn test_finished_worker_is_collected_without_new_request() {
        let engine = ScriptedEngine::new(2);
        let (clock, mut scheduler, mut runner) = setup(engine);
        let store = store_with_samples(2);

        scheduler.request_training();
        clock.advance(DELAY);
        scheduler.poll(&mut runner, &store);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut completed = Vec::new();
        while completed.is_empty() && Instant::now() < deadline {
            completed = scheduler.poll(&mut runner, &store).completed;
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(completed.len(), 1);
        assert!(completed[0].succeeded());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_cancelled_successor_keeps_running_result() {
        let engine = ScriptedEngine::new(2).with_train_delay(Duration::from_millis(30));
        let calls = engine.calls();
        let (clock, mut scheduler, mut runner) = setup(engine);
        let store = store_with_samples(2);

        scheduler.request_training();
        clock.advance(DELAY);
        assert_eq!(scheduler.poll(&mut runner, &store).launched, Some(1));
        scheduler.request_training();
        assert!(matches!(
            scheduler.state(),
            SchedulerState::RunningWithPending { .. }
        ));

        scheduler.cancel_pending();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        let report = run_to_idle(&mut scheduler, &mut runner);
        assert_eq!(report.status, TrainingStatus::Succeeded);
        assert!(runner.is_trained());

        scheduler.request_training();
        clock.advance(DELAY);
        assert_eq!(scheduler.poll(&mut runner, &store).launched, Some(2));
        assert!(run_to_idle(&mut scheduler, &mut runner).succeeded());
        assert_eq!(calls.train_calls(), 2);
    }

    #[test]
    fn test_cancel_pending() {
        let (clock, mut scheduler, mut runner) = setup(ScriptedEngine::new(2));
        scheduler.request_training();
        scheduler.cancel_pending();
        clock.advance(DELAY);
        assert!(scheduler.poll(&mut runner, &store_with_samples(1)).launched.is_none());
        assert!(scheduler.is_idle());
    }
}
