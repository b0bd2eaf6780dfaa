//! Sink that only logs what it is asked to do.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Sink, SinkError};
use crate::domain::Action;

/// Accepts every action and logs it. Useful for dry runs.
#[derive(Debug, Default)]
pub struct LogSink {
    executed: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions logged so far
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn execute(&self, _cancel: &CancellationToken, action: Action) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&action).map_err(anyhow::Error::from)?;
        info!(action = %action.kind(), %payload, "Dry-run action");
        self.executed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawTransaction, SubmitShareBundle};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_execution_is_counted() {
        let sink = Arc::new(LogSink::new());
        let mut handles = Vec::new();

        for block in 0..8u64 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                let action = Action::from(SubmitShareBundle {
                    transactions: vec![RawTransaction(vec![0x01])],
                    target_block: block,
                    hints: Vec::new(),
                });
                sink.execute(&CancellationToken::new(), action).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(sink.executed(), 8);
    }
}
