//! Observed-fact values produced by sources.
//!
//! An event carries only what was known when it was observed. It is created
//! by a source, handed once to the dispatch path, and then dropped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Something a source observed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new block header was seen
    HeaderObserved(HeaderObserved),

    /// A transaction was seen in a new block
    TransactionObserved(TransactionObserved),

    /// A log matching a filter was emitted
    LogObserved(LogObserved),
}

impl Event {
    /// The variant tag, for logging and routing
    pub fn kind(&self) -> EventKind {
        match self {
            Event::HeaderObserved(_) => EventKind::Header,
            Event::TransactionObserved(_) => EventKind::Transaction,
            Event::LogObserved(_) => EventKind::Log,
        }
    }
}

impl From<HeaderObserved> for Event {
    fn from(header: HeaderObserved) -> Self {
        Event::HeaderObserved(header)
    }
}

impl From<TransactionObserved> for Event {
    fn from(tx: TransactionObserved) -> Self {
        Event::TransactionObserved(tx)
    }
}

impl From<LogObserved> for Event {
    fn from(log: LogObserved) -> Self {
        Event::LogObserved(log)
    }
}

/// Discriminant of [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Header,
    Transaction,
    Log,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Header => "header",
            EventKind::Transaction => "transaction",
            EventKind::Log => "log",
        };
        f.write_str(name)
    }
}

/// A block header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderObserved {
    /// Block height
    pub number: u64,

    /// Block hash (0x-prefixed hex)
    pub hash: String,

    /// Block timestamp in unix seconds
    pub timestamp: u64,
}

/// A transaction included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionObserved {
    /// Transaction hash
    pub hash: String,

    /// Sender address
    pub from: String,

    /// Recipient address, absent for contract creation
    pub to: Option<String>,

    /// Transferred value in wei, as a decimal string
    pub value: String,
}

/// A contract log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogObserved {
    /// Emitting contract
    pub address: String,

    /// Indexed topics, first one is usually the event signature
    pub topics: Vec<String>,

    /// Non-indexed payload
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,

    pub block_number: u64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: u64,

    /// Position of the log within the block
    pub log_index: u64,
}

/// Serialize byte payloads as 0x-prefixed hex
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode(&s).map_err(serde::de::Error::custom)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(s.strip_prefix("0x").unwrap_or(s))
    }
}
