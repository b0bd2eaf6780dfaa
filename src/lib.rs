//! strix - Event-driven automation engine for reactive chain bots
//!
//! Independent sources observe the outside world and emit events. The engine
//! runs every event through an ordered list of deciders and hands the actions
//! they produce to a single sink.
//!
//! # Architecture
//!
//! - One worker task per source; events from a source are handled in order
//! - Deciders run in registration order, and each decider's actions reach the
//!   sink before the next decider runs
//! - No ordering across sources; the sink must tolerate concurrent calls
//! - Failures of a source, decider or action are logged and isolated
//!
//! # Modules
//!
//! - `core`: Engine, dispatch path, error taxonomy, counters
//! - `domain`: Event and Action values
//! - `sources`: Source trait, plumbing, in-process and JSON-RPC sources
//! - `deciders`: Decider trait and a header printer
//! - `sinks`: Sink trait, log sink, router
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Print new block headers until Ctrl-C
//! strix run --rpc-url http://localhost:8545
//!
//! # Also watch transactions and filtered logs
//! strix run --headers --transactions --logs
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod deciders;
pub mod domain;
pub mod rpc;
pub mod sinks;
pub mod sources;

// Re-export main types at crate root for convenience
pub use crate::core::{Engine, EngineError, EngineState, ShutdownReport};
pub use deciders::Decider;
pub use domain::{Action, ActionKind, Event, EventKind};
pub use sinks::{Sink, SinkError};
pub use sources::{EventStream, Source, SourceError};
