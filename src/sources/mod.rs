//! Event sources.
//!
//! A source owns its own production loop and exposes the events it observes
//! through an [`EventStream`]. The engine drives each source from a dedicated
//! worker, so nothing here is shared between sources.
//!
//! - `ChannelSource`: in-process source fed through a [`ChannelFeed`]
//! - `chain`: JSON-RPC polling sources for headers, transactions and logs

pub mod chain;
pub mod channel;

use std::future::Future;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::Event;
use crate::rpc::RpcError;

pub use chain::{HeaderSource, LogFilter, LogSource, PollSettings, TransactionSource};
pub use channel::{ChannelFeed, ChannelSource};

/// Errors raised by sources and their production loops
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source already started")]
    AlreadyStarted,

    #[error("Event stream already taken")]
    EventsTaken,

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What a production loop yields: an event, or the error that ended it
pub type SourceItem = Result<Event, SourceError>;

/// A producer of events.
///
/// `start` must return without waiting for production to finish. `stop` and
/// cancellation of the token passed to `start` are equivalent: either one
/// makes the stream returned by `events` terminate.
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Begin production in the background
    async fn start(&self, cancel: CancellationToken) -> Result<(), SourceError>;

    /// Ask production to cease
    async fn stop(&self) -> Result<(), SourceError>;

    /// Take the stream of produced events. Not restartable.
    fn events(&self) -> Result<EventStream, SourceError>;
}

/// Lazy sequence of events from one source
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<SourceItem>,
}

impl EventStream {
    pub fn new(rx: mpsc::Receiver<SourceItem>) -> Self {
        Self { rx }
    }

    /// Next item, or `None` once production has ended and the buffer drained
    pub async fn next(&mut self) -> Option<SourceItem> {
        self.rx.recv().await
    }
}

/// Shared plumbing for source implementations.
///
/// Holds the channel between a production loop and its [`EventStream`], plus
/// the token that `stop` cancels.
#[derive(Debug)]
pub struct Producer {
    control: Mutex<Control>,
    rx: Mutex<Option<mpsc::Receiver<SourceItem>>>,
}

/// Launch/halt state. Kept under one lock so a halt can never slip between
/// taking the sender and publishing the token.
#[derive(Debug)]
struct Control {
    tx: Option<mpsc::Sender<SourceItem>>,
    halt: Option<CancellationToken>,
    halted: bool,
}

impl Producer {
    /// Create plumbing with a bounded buffer of `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            control: Mutex::new(Control {
                tx: Some(tx),
                halt: None,
                halted: false,
            }),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Spawn the production loop.
    ///
    /// The loop runs under a child of `cancel` that [`Producer::halt`] also
    /// cancels. If it returns an error while not halted, the error is
    /// delivered on the stream. The stream ends once the loop returns.
    ///
    /// After a halt this does nothing and succeeds; the stream is already
    /// over.
    pub fn launch<F, Fut>(&self, cancel: &CancellationToken, run: F) -> Result<(), SourceError>
    where
        F: FnOnce(Emitter) -> Fut,
        Fut: Future<Output = Result<(), SourceError>> + Send + 'static,
    {
        let (tx, halt) = {
            let mut control = lock(&self.control);
            if control.halted {
                tracing::debug!("Launch after halt, nothing to produce");
                return Ok(());
            }
            let tx = control.tx.take().ok_or(SourceError::AlreadyStarted)?;
            let halt = cancel.child_token();
            control.halt = Some(halt.clone());
            (tx, halt)
        };

        let failure_tx = tx.clone();
        let emitter = Emitter {
            tx,
            halt: halt.clone(),
        };
        let production = run(emitter);

        tokio::spawn(async move {
            if let Err(e) = production.await {
                if halt.is_cancelled() {
                    tracing::debug!(error = %e, "Production ended after halt");
                } else {
                    tracing::warn!(error = %e, "Production loop failed");
                    let _ = failure_tx.send(Err(e)).await;
                }
            }
        });

        Ok(())
    }

    /// Cancel the production loop. Safe to call more than once, and before
    /// [`Producer::launch`].
    pub fn halt(&self) {
        let mut control = lock(&self.control);
        control.halted = true;
        // Never launched: dropping the sender ends the stream
        control.tx.take();
        if let Some(halt) = &control.halt {
            halt.cancel();
        }
    }

    /// Hand out the receiving end, once
    pub fn stream(&self) -> Result<EventStream, SourceError> {
        lock(&self.rx)
            .take()
            .map(EventStream::new)
            .ok_or(SourceError::EventsTaken)
    }
}

/// Sending half given to a production loop
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<SourceItem>,
    halt: CancellationToken,
}

impl Emitter {
    /// Deliver an event. Returns `false` once the loop should stop, either
    /// because it was halted or because nobody is reading any more.
    pub async fn emit(&self, event: impl Into<Event>) -> bool {
        tokio::select! {
            biased;
            _ = self.halt.cancelled() => false,
            sent = self.tx.send(Ok(event.into())) => sent.is_ok(),
        }
    }

    /// Resolves when stop or cancellation was requested
    pub async fn halted(&self) {
        self.halt.cancelled().await
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_cancelled()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
