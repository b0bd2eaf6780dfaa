//! Execution sinks.
//!
//! The engine hands every action to a single sink. Workers for different
//! sources call it concurrently and the engine takes no lock around it, so
//! a sink must be safe under concurrent `execute` calls on its own.
//!
//! - `LogSink`: logs and accepts every action
//! - `RouterSink`: forwards each action kind to a dedicated sink

pub mod log;
pub mod router;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{Action, ActionKind};

pub use log::LogSink;
pub use router::RouterSink;

/// Errors a sink may report for one action
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Unsupported action: {0}")]
    UnsupportedAction(ActionKind),

    #[error("Execution failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Trait for action executors
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human-readable sink name
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Perform the side effect described by `action`.
    ///
    /// Variants the sink cannot perform must fail with
    /// [`SinkError::UnsupportedAction`].
    async fn execute(&self, cancel: &CancellationToken, action: Action) -> Result<(), SinkError>;
}
