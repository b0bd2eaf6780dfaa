//! Decision logic.
//!
//! A decider maps one event to zero or more actions. Deciders run in
//! registration order on whichever worker received the event, so any state a
//! decider keeps across calls must be internally synchronized.

pub mod header_printer;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Action, Event};

pub use header_printer::HeaderPrinter;

/// Trait for decision logic
#[async_trait]
pub trait Decider: Send + Sync {
    /// Human-readable decider name
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Decide what to do about `event`.
    ///
    /// Must not block indefinitely. Variants the decider does not handle
    /// yield an empty list. A failure must leave the decider usable for the
    /// next event.
    async fn process(&self, cancel: &CancellationToken, event: &Event) -> Result<Vec<Action>>;
}
