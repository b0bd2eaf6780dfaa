//! Sink that dispatches on the action variant.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Sink, SinkError};
use crate::domain::{Action, ActionKind};

/// Routes each action to the sink registered for its kind.
///
/// Kinds without a route fail with [`SinkError::UnsupportedAction`].
#[derive(Default)]
pub struct RouterSink {
    routes: HashMap<ActionKind, Arc<dyn Sink>>,
}

impl RouterSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` for `kind`, replacing any previous route
    pub fn route(mut self, kind: ActionKind, sink: Arc<dyn Sink>) -> Self {
        self.routes.insert(kind, sink);
        self
    }

    pub fn handles(&self, kind: ActionKind) -> bool {
        self.routes.contains_key(&kind)
    }
}

#[async_trait]
impl Sink for RouterSink {
    fn name(&self) -> &str {
        "router"
    }

    async fn execute(&self, cancel: &CancellationToken, action: Action) -> Result<(), SinkError> {
        let kind = action.kind();
        let sink = self
            .routes
            .get(&kind)
            .ok_or(SinkError::UnsupportedAction(kind))?;

        debug!(action = %kind, sink = sink.name(), "Routing action");
        sink.execute(cancel, action).await
    }
}
