//! Core orchestration logic.
//!
//! This module contains:
//! - Engine: owns sources, deciders and the sink; runs one worker per source
//! - Dispatcher: the per-event decision and execution path
//! - EngineStats: counters for isolated failures and throughput

pub mod engine;
pub mod error;
pub mod stats;

// Re-export commonly used types
pub use engine::{Dispatcher, Engine, EngineState, ShutdownReport};
pub use error::{EngineError, SourceOperation};
pub use stats::{EngineStats, StatsSnapshot};
