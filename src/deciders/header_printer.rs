//! Decider that reports new block headers and never acts.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Decider;
use crate::domain::{Action, Event};

/// Logs every header event it sees
#[derive(Debug, Default)]
pub struct HeaderPrinter;

impl HeaderPrinter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Decider for HeaderPrinter {
    fn name(&self) -> &str {
        "header_printer"
    }

    async fn process(&self, _cancel: &CancellationToken, event: &Event) -> Result<Vec<Action>> {
        if let Event::HeaderObserved(header) = event {
            info!(
                number = header.number,
                hash = %header.hash,
                timestamp = header.timestamp,
                "New block header"
            );
        }
        Ok(Vec::new())
    }
}
