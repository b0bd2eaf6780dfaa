//! In-process source fed by application code.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{EventStream, Producer, Source, SourceError};
use crate::domain::Event;

/// Source that forwards whatever is pushed through its [`ChannelFeed`].
///
/// Production ends when every feed handle has been dropped, or on stop.
pub struct ChannelSource {
    name: String,
    producer: Producer,
    inbound: std::sync::Mutex<Option<mpsc::Receiver<Event>>>,
}

/// Handle for pushing events into a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct ChannelFeed {
    tx: mpsc::Sender<Event>,
}

impl ChannelFeed {
    /// Queue an event, waiting for buffer space.
    /// Fails once the source has stopped.
    pub async fn push(&self, event: impl Into<Event>) -> Result<(), SourceError> {
        self.tx
            .send(event.into())
            .await
            .map_err(|_| SourceError::Other(anyhow::anyhow!("Channel source is closed")))
    }
}

impl ChannelSource {
    /// Create a source and the feed that drives it
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, ChannelFeed) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let source = Self {
            name: name.into(),
            producer: Producer::new(capacity),
            inbound: std::sync::Mutex::new(Some(rx)),
        };
        (source, ChannelFeed { tx })
    }
}

#[async_trait]
impl Source for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), SourceError> {
        let mut inbound = self
            .inbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(SourceError::AlreadyStarted)?;

        self.producer.launch(&cancel, |emitter| async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = emitter.halted() => break,
                    event = inbound.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                if !emitter.emit(event).await {
                    break;
                }
            }
            Ok(())
        })
    }

    async fn stop(&self) -> Result<(), SourceError> {
        self.producer.halt();
        Ok(())
    }

    fn events(&self) -> Result<EventStream, SourceError> {
        self.producer.stream()
    }
}
