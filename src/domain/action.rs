//! Instructions produced by deciders and performed by a sink.
//!
//! Actions are derived from events only. A sink consumes each one exactly
//! once and never re-emits it.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::event::hex_bytes;

/// Something to be performed by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Place a trade on a venue
    ExecuteTrade(ExecuteTrade),

    /// Sign and broadcast a transaction to the public mempool
    SendTransaction(SendTransaction),

    /// Submit a private bundle to a relay for a target block
    SubmitPrivateBundle(SubmitPrivateBundle),

    /// Submit a bundle to an order-flow share relay, with privacy hints
    SubmitShareBundle(SubmitShareBundle),
}

impl Action {
    /// The variant tag, for logging and routing
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ExecuteTrade(_) => ActionKind::ExecuteTrade,
            Action::SendTransaction(_) => ActionKind::SendTransaction,
            Action::SubmitPrivateBundle(_) => ActionKind::SubmitPrivateBundle,
            Action::SubmitShareBundle(_) => ActionKind::SubmitShareBundle,
        }
    }
}

impl From<ExecuteTrade> for Action {
    fn from(trade: ExecuteTrade) -> Self {
        Action::ExecuteTrade(trade)
    }
}

impl From<SendTransaction> for Action {
    fn from(tx: SendTransaction) -> Self {
        Action::SendTransaction(tx)
    }
}

impl From<SubmitPrivateBundle> for Action {
    fn from(bundle: SubmitPrivateBundle) -> Self {
        Action::SubmitPrivateBundle(bundle)
    }
}

impl From<SubmitShareBundle> for Action {
    fn from(bundle: SubmitShareBundle) -> Self {
        Action::SubmitShareBundle(bundle)
    }
}

/// Discriminant of [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ExecuteTrade,
    SendTransaction,
    SubmitPrivateBundle,
    SubmitShareBundle,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::ExecuteTrade => "execute_trade",
            ActionKind::SendTransaction => "send_transaction",
            ActionKind::SubmitPrivateBundle => "submit_private_bundle",
            ActionKind::SubmitShareBundle => "submit_share_bundle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Trade parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteTrade {
    /// Asset symbol or token address
    pub asset: String,

    /// Quantity, as a decimal string
    pub amount: String,

    /// Limit price, as a decimal string
    pub price: String,

    pub side: TradeSide,
}

/// Raw transaction fields plus the key to sign them with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransaction {
    pub from: String,
    pub to: String,

    /// Value in wei, as a decimal string
    pub value: String,

    /// Calldata
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,

    pub gas_limit: u64,

    #[serde(skip_serializing)]
    pub signer: SigningKey,
}

/// Bundle for a private relay, signed by the sink before submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPrivateBundle {
    pub transactions: Vec<RawTransaction>,

    /// Block the bundle must land in
    pub target_block: u64,

    pub chain_id: u64,

    #[serde(skip_serializing)]
    pub signer: SigningKey,
}

/// Bundle for an order-flow share relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitShareBundle {
    /// Signed, encoded transactions
    pub transactions: Vec<RawTransaction>,

    pub target_block: u64,

    /// Fields the relay may reveal to searchers (e.g. "calldata", "logs")
    pub hints: Vec<String>,
}

/// An encoded transaction
#[derive(Clone, PartialEq, Eq)]
pub struct RawTransaction(pub Vec<u8>);

impl fmt::Debug for RawTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawTransaction(0x{})", hex::encode(&self.0))
    }
}

impl Serialize for RawTransaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hex_bytes::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for RawTransaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hex_bytes::deserialize(deserializer).map(Self)
    }
}

/// Private key material handed to a sink for signing.
///
/// Never printed and never serialized. Accepted from a hex string when an
/// action is loaded, so actions written back out lose their key.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// Parse a hex-encoded secret, with or without 0x prefix
    pub fn from_hex(secret: &str) -> Result<Self, hex::FromHexError> {
        hex_bytes::decode(secret).map(Self)
    }

    pub fn expose_secret(&self) -> &[u8] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for SigningKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hex_bytes::deserialize(deserializer).map(Self)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}
