//! Domain types for the strix engine.
//!
//! This module contains the two value types that flow through the engine:
//! - Event: facts observed by sources
//! - Action: instructions produced by deciders for the sink

pub mod action;
pub mod event;

// Re-export commonly used types
pub use action::{
    Action, ActionKind, ExecuteTrade, RawTransaction, SendTransaction, SigningKey,
    SubmitPrivateBundle, SubmitShareBundle, TradeSide,
};
pub use event::{Event, EventKind, HeaderObserved, LogObserved, TransactionObserved};
