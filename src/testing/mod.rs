//! Test doubles for the pipeline engine.
//!
//! Public so integration tests under `tests/` can drive a full session
//! without a real classification toolkit.

pub mod scripted_engine;

pub use scripted_engine::{EngineCalls, ScriptedEngine, TrainBehavior};
