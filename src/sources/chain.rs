//! JSON-RPC polling sources.
//!
//! Each source ticks on a fixed interval, asks the node for whatever is new
//! since its last tick, and emits the result in chain order. Transient RPC
//! failures are retried on the next tick; a run of consecutive failures ends
//! production for good.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Emitter, EventStream, Producer, Source, SourceError};
use crate::rpc::{RpcClient, RpcError};

pub use crate::rpc::LogFilter;

/// Polling behaviour shared by the chain sources
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Time between polls
    pub interval: Duration,

    /// Consecutive failed polls before production gives up
    pub max_consecutive_failures: u32,

    /// Upper bound on blocks scanned in one poll
    pub max_blocks_per_poll: u64,

    /// Events buffered between the source and its worker
    pub event_buffer: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_consecutive_failures: 5,
            max_blocks_per_poll: 16,
            event_buffer: 256,
        }
    }
}

/// One polling step. Returns `Ok(false)` when the emitter refused an event
/// and the loop should end.
#[async_trait]
trait Poller: Send + 'static {
    async fn poll(&mut self, emitter: &Emitter) -> Result<bool, RpcError>;
}

async fn run_polling<P: Poller>(
    mut poller: P,
    emitter: Emitter,
    settings: PollSettings,
    name: String,
) -> Result<(), SourceError> {
    let mut ticker = tokio::time::interval(settings.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    info!(source = %name, interval_ms = settings.interval.as_millis() as u64, "Polling started");

    loop {
        tokio::select! {
            biased;
            _ = emitter.halted() => break,
            _ = ticker.tick() => {}
        }

        match poller.poll(&emitter).await {
            Ok(true) => failures = 0,
            Ok(false) => break,
            Err(e) => {
                failures += 1;
                warn!(source = %name, failures, error = %e, "Poll failed");
                if failures >= settings.max_consecutive_failures.max(1) {
                    return Err(e.into());
                }
            }
        }
    }

    debug!(source = %name, "Polling stopped");
    Ok(())
}

/// Plan the next inclusive block range to scan, if any
fn next_range(next: Option<u64>, latest: u64, max_blocks: u64) -> Option<(u64, u64)> {
    let from = next.unwrap_or(latest);
    if from > latest {
        return None;
    }
    let to = latest.min(from.saturating_add(max_blocks.max(1) - 1));
    Some((from, to))
}

struct HeaderPoller {
    client: Arc<RpcClient>,
    last: Option<u64>,
}

#[async_trait]
impl Poller for HeaderPoller {
    async fn poll(&mut self, emitter: &Emitter) -> Result<bool, RpcError> {
        let header = self.client.latest_header().await?;
        if self.last.is_some_and(|last| header.number <= last) {
            return Ok(true);
        }
        self.last = Some(header.number);
        Ok(emitter.emit(header).await)
    }
}

struct TransactionPoller {
    client: Arc<RpcClient>,
    next: Option<u64>,
    max_blocks: u64,
}

#[async_trait]
impl Poller for TransactionPoller {
    async fn poll(&mut self, emitter: &Emitter) -> Result<bool, RpcError> {
        let latest = self.client.block_number().await?;
        let Some((from, to)) = next_range(self.next, latest, self.max_blocks) else {
            return Ok(true);
        };

        for number in from..=to {
            let transactions = self.client.block_transactions(number).await?;
            for tx in transactions {
                if !emitter.emit(tx).await {
                    return Ok(false);
                }
            }
            self.next = Some(number + 1);
        }
        Ok(true)
    }
}

struct LogPoller {
    client: Arc<RpcClient>,
    filter: LogFilter,
    next: Option<u64>,
    max_blocks: u64,
}

#[async_trait]
impl Poller for LogPoller {
    async fn poll(&mut self, emitter: &Emitter) -> Result<bool, RpcError> {
        let latest = self.client.block_number().await?;
        let Some((from, to)) = next_range(self.next, latest, self.max_blocks) else {
            return Ok(true);
        };

        let logs = self.client.logs(&self.filter, from, to).await?;
        for log in logs {
            if !emitter.emit(log).await {
                return Ok(false);
            }
        }
        self.next = Some(to + 1);
        Ok(true)
    }
}

/// Emits a `HeaderObserved` whenever the chain head advances
pub struct HeaderSource {
    client: Arc<RpcClient>,
    settings: PollSettings,
    producer: Producer,
}

impl HeaderSource {
    pub fn new(client: Arc<RpcClient>, settings: PollSettings) -> Self {
        let producer = Producer::new(settings.event_buffer);
        Self {
            client,
            settings,
            producer,
        }
    }
}

#[async_trait]
impl Source for HeaderSource {
    fn name(&self) -> &str {
        "headers"
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), SourceError> {
        let poller = HeaderPoller {
            client: Arc::clone(&self.client),
            last: None,
        };
        let settings = self.settings.clone();
        let name = self.name().to_string();
        self.producer.launch(&cancel, move |emitter| {
            run_polling(poller, emitter, settings, name)
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

/// Emits a `TransactionObserved` for every transaction in each new block
pub struct TransactionSource {
    client: Arc<RpcClient>,
    settings: PollSettings,
    producer: Producer,
}

impl TransactionSource {
    pub fn new(client: Arc<RpcClient>, settings: PollSettings) -> Self {
        let producer = Producer::new(settings.event_buffer);
        Self {
            client,
            settings,
            producer,
        }
    }
}

#[async_trait]
impl Source for TransactionSource {
    fn name(&self) -> &str {
        "transactions"
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), SourceError> {
        let poller = TransactionPoller {
            client: Arc::clone(&self.client),
            next: None,
            max_blocks: self.settings.max_blocks_per_poll,
        };
        let settings = self.settings.clone();
        let name = self.name().to_string();
        self.producer.launch(&cancel, move |emitter| {
            run_polling(poller, emitter, settings, name)
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

/// Emits a `LogObserved` for every log matching its filter in new blocks
pub struct LogSource {
    client: Arc<RpcClient>,
    filter: LogFilter,
    settings: PollSettings,
    producer: Producer,
}

impl LogSource {
    pub fn new(client: Arc<RpcClient>, filter: LogFilter, settings: PollSettings) -> Self {
        let producer = Producer::new(settings.event_buffer);
        Self {
            client,
            filter,
            settings,
            producer,
        }
    }
}

#[async_trait]
impl Source for LogSource {
    fn name(&self) -> &str {
        "logs"
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), SourceError> {
        let poller = LogPoller {
            client: Arc::clone(&self.client),
            filter: self.filter.clone(),
            next: None,
            max_blocks: self.settings.max_blocks_per_poll,
        };
        let settings = self.settings.clone();
        let name = self.name().to_string();
        self.producer.launch(&cancel, move |emitter| {
            run_polling(poller, emitter, settings, name)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, HeaderObserved};

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            max_consecutive_failures: 3,
            max_blocks_per_poll: 4,
            event_buffer: 8,
        }
    }

    /// Replays a script of poll outcomes, then idles
    struct Scripted {
        script: Vec<Result<u64, ()>>,
    }

    #[async_trait]
    impl Poller for Scripted {
        async fn poll(&mut self, emitter: &Emitter) -> Result<bool, RpcError> {
            if self.script.is_empty() {
                return Ok(true);
            }
            match self.script.remove(0) {
                Ok(number) => Ok(emitter
                    .emit(HeaderObserved {
                        number,
                        hash: String::new(),
                        timestamp: 0,
                    })
                    .await),
                Err(()) => Err(RpcError::EmptyResult("eth_blockNumber".to_string())),
            }
        }
    }

    #[test]
    fn test_next_range() {
        // First poll only looks at the head
        assert_eq!(next_range(None, 100, 16), Some((100, 100)));
        // Caught up
        assert_eq!(next_range(Some(101), 100, 16), None);
        // Catching up is bounded
        assert_eq!(next_range(Some(10), 100, 16), Some((10, 25)));
        assert_eq!(next_range(Some(98), 100, 16), Some((98, 100)));
        assert_eq!(next_range(Some(5), 100, 0), Some((5, 5)));
    }

    #[tokio::test]
    async fn test_consecutive_failures_end_production() {
        let producer = Producer::new(8);
        let mut stream = producer.stream().unwrap();
        let poller = Scripted {
            script: vec![Ok(1), Err(()), Err(()), Err(())],
        };
        producer
            .launch(&CancellationToken::new(), |emitter| {
                run_polling(poller, emitter, fast(), "scripted".to_string())
            })
            .unwrap();

        assert!(matches!(stream.next().await, Some(Ok(Event::HeaderObserved(_)))));
        assert!(matches!(stream.next().await, Some(Err(SourceError::Rpc(_)))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let producer = Producer::new(8);
        let mut stream = producer.stream().unwrap();
        let poller = Scripted {
            script: vec![Err(()), Err(()), Ok(1), Err(()), Err(()), Ok(2)],
        };
        producer
            .launch(&CancellationToken::new(), |emitter| {
                run_polling(poller, emitter, fast(), "scripted".to_string())
            })
            .unwrap();

        let mut numbers = Vec::new();
        for _ in 0..2 {
            match stream.next().await {
                Some(Ok(Event::HeaderObserved(h))) => numbers.push(h.number),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(numbers, vec![1, 2]);

        producer.halt();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sources_report_names() {
        let client = Arc::new(RpcClient::new("http://127.0.0.1:8545", Duration::from_secs(1)).unwrap());
        assert_eq!(HeaderSource::new(client.clone(), fast()).name(), "headers");
        assert_eq!(TransactionSource::new(client.clone(), fast()).name(), "transactions");
        assert_eq!(LogSource::new(client, LogFilter::default(), fast()).name(), "logs");
    }
}
