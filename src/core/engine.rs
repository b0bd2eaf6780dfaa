//! The engine: fans events from every source into decision and execution.
//!
//! Each registered source gets its own worker task. A worker starts its
//! source, then repeatedly waits for either the next event or cancellation
//! and runs the event through the [`Dispatcher`]. Events from one source are
//! handled strictly in order; workers for different sources run
//! independently, so the sink may be called from several of them at once.
//!
//! Failures of a single source, decider call or action are logged, counted
//! and dropped. Only a missing sink stops [`Engine::start`].

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::deciders::Decider;
use crate::domain::Event;
use crate::sinks::Sink;
use crate::sources::Source;

use super::error::{EngineError, SourceOperation};
use super::stats::{EngineStats, StatsSnapshot};

/// Lifecycle of an [`Engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Configurable, no work running
    Created,

    /// Workers running
    Started,

    /// Stop requested, draining workers
    Stopping,

    /// Terminal
    Stopped,
}

/// Outcome of [`Engine::stop`]
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Sources whose `stop` failed; shutdown continued regardless
    pub stop_failures: Vec<EngineError>,

    /// Workers that panicked instead of exiting
    pub panicked_workers: usize,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stop_failures.is_empty() && self.panicked_workers == 0
    }
}

/// Orchestrates sources, deciders and the sink.
///
/// Dropping a started engine without calling [`Engine::stop`] aborts its
/// workers.
pub struct Engine {
    sources: Vec<Arc<dyn Source>>,
    deciders: Vec<Arc<dyn Decider>>,
    sink: Option<Arc<dyn Sink>>,
    state: EngineState,
    workers: JoinSet<()>,
    stats: Arc<EngineStats>,
    /// Cancelled by `stop`; workers that have not started their source yet
    /// skip it
    stopping: CancellationToken,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with nothing registered
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            deciders: Vec::new(),
            sink: None,
            state: EngineState::Created,
            workers: JoinSet::new(),
            stats: Arc::new(EngineStats::default()),
            stopping: CancellationToken::new(),
        }
    }

    /// Register a source. Ignored once the engine has started.
    pub fn add_source(&mut self, source: Arc<dyn Source>) {
        if self.reject_mutation("add_source") {
            return;
        }
        self.sources.push(source);
    }

    /// Register a decider. Deciders run in registration order.
    /// Ignored once the engine has started.
    pub fn add_decider(&mut self, decider: Arc<dyn Decider>) {
        if self.reject_mutation("add_decider") {
            return;
        }
        self.deciders.push(decider);
    }

    /// Set the sink, replacing any previous one. Ignored once the engine has
    /// started.
    pub fn set_sink(&mut self, sink: Arc<dyn Sink>) {
        if self.reject_mutation("set_sink") {
            return;
        }
        self.sink = Some(sink);
    }

    fn reject_mutation(&self, operation: &str) -> bool {
        if self.state == EngineState::Created {
            return false;
        }
        warn!(operation, state = ?self.state, "Engine already started, ignoring change");
        true
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn decider_count(&self) -> usize {
        self.deciders.len()
    }

    /// Build the decision/execution path from what is registered now
    fn dispatcher(&self) -> Result<Dispatcher, EngineError> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| EngineError::Configuration("no sink set".to_string()))?;

        Ok(Dispatcher {
            deciders: self.deciders.clone(),
            sink,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Spawn one worker per source and return immediately.
    ///
    /// Fails without spawning anything if no sink is set.
    #[instrument(skip_all, fields(sources = self.sources.len(), deciders = self.deciders.len()))]
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<(), EngineError> {
        if self.state != EngineState::Created {
            return Err(EngineError::AlreadyStarted);
        }

        let dispatcher = Arc::new(self.dispatcher()?);

        for source in &self.sources {
            self.workers.spawn(run_worker(
                Arc::clone(source),
                Arc::clone(&dispatcher),
                cancel.clone(),
                self.stopping.clone(),
            ));
        }

        self.state = EngineState::Started;
        info!("Engine started");
        Ok(())
    }

    /// Run one event through every decider and forward their actions.
    ///
    /// This is what each worker does per event; exposed for driving the
    /// pipeline without sources.
    pub async fn dispatch(&self, cancel: &CancellationToken, event: &Event) -> Result<(), EngineError> {
        self.dispatcher()?.dispatch(cancel, event).await;
        Ok(())
    }

    /// Stop every source, then wait for every worker to exit.
    ///
    /// Source stop failures are logged and collected in the report, never
    /// returned as errors. A no-op before `start` and after a previous
    /// `stop`. Does not cancel the token given to `start`.
    #[instrument(skip_all)]
    pub async fn stop(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        match self.state {
            EngineState::Created | EngineState::Stopped => {
                debug!(state = ?self.state, "Stop ignored");
                return report;
            }
            EngineState::Started | EngineState::Stopping => {}
        }

        self.state = EngineState::Stopping;
        self.stopping.cancel();
        info!(workers = self.workers.len(), "Stopping engine");

        for source in &self.sources {
            if let Err(e) = source.stop().await {
                let err = EngineError::SourceLifecycle {
                    name: source.name().to_string(),
                    operation: SourceOperation::Stop,
                    error: e,
                };
                warn!(error = %err, "Source stop failed");
                report.stop_failures.push(err);
            }
        }

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(error = %e, "Worker panicked");
                    report.panicked_workers += 1;
                }
            }
        }

        self.state = EngineState::Stopped;
        info!(
            stop_failures = report.stop_failures.len(),
            panicked_workers = report.panicked_workers,
            "Engine stopped"
        );
        report
    }
}

/// Decision and execution path shared by all workers.
///
/// Holds no lock: deciders and the sink are invoked concurrently from
/// different workers and must cope with that themselves.
pub struct Dispatcher {
    deciders: Vec<Arc<dyn Decider>>,
    sink: Arc<dyn Sink>,
    stats: Arc<EngineStats>,
}

impl Dispatcher {
    /// Evaluate deciders in order; forward each decider's actions to the sink,
    /// in the order returned, before evaluating the next decider.
    pub async fn dispatch(&self, cancel: &CancellationToken, event: &Event) {
        self.stats.event_dispatched();

        for decider in &self.deciders {
            let actions = match decider.process(cancel, event).await {
                Ok(actions) => actions,
                Err(e) => {
                    let err = EngineError::Decision {
                        decider: decider.name().to_string(),
                        event: event.kind(),
                        error: e,
                    };
                    warn!(error = %err, "Decider failed");
                    self.stats.decision_failed();
                    continue;
                }
            };

            for action in actions {
                let kind = action.kind();
                match self.sink.execute(cancel, action).await {
                    Ok(()) => self.stats.action_executed(),
                    Err(e) => {
                        let err = EngineError::Execution {
                            sink: self.sink.name().to_string(),
                            action: kind,
                            error: e,
                        };
                        error!(error = %err, "Action failed");
                        self.stats.execution_failed();
                    }
                }
            }
        }
    }
}

/// Drive one source until it ends, fails, or the token is cancelled
async fn run_worker(
    source: Arc<dyn Source>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    stopping: CancellationToken,
) {
    let name = source.name().to_string();

    if stopping.is_cancelled() {
        debug!(source = %name, "Engine stopping, source not started");
        return;
    }

    if let Err(e) = source.start(cancel.clone()).await {
        abandon(&dispatcher, &name, SourceOperation::Start, e);
        return;
    }

    let mut events = match source.events() {
        Ok(events) => events,
        Err(e) => {
            abandon(&dispatcher, &name, SourceOperation::TakeEvents, e);
            return;
        }
    };

    debug!(source = %name, "Worker running");

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(source = %name, "Worker cancelled");
                break;
            }
            item = events.next() => item,
        };

        match item {
            Some(Ok(event)) => dispatcher.dispatch(&cancel, &event).await,
            Some(Err(e)) => {
                let err = EngineError::SourceProduction {
                    name: name.clone(),
                    error: e,
                };
                error!(error = %err, "Source failed, worker exiting");
                dispatcher.stats.source_failed();
                break;
            }
            None => {
                info!(source = %name, "Source finished");
                break;
            }
        }
    }
}

fn abandon(
    dispatcher: &Dispatcher,
    name: &str,
    operation: SourceOperation,
    error: crate::sources::SourceError,
) {
    let err = EngineError::SourceLifecycle {
        name: name.to_string(),
        operation,
        error,
    };
    error!(error = %err, "Abandoning worker");
    dispatcher.stats.source_failed();
}
