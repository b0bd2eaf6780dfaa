//! Error taxonomy for the engine.
//!
//! Only `Configuration` and `AlreadyStarted` ever reach the caller of
//! [`Engine::start`](super::Engine::start). Every other variant describes a
//! failure that was isolated to one source, decider or action; it is logged,
//! counted, and dropped.

use std::fmt;

use thiserror::Error;

use crate::domain::{ActionKind, EventKind};
use crate::sinks::SinkError;
use crate::sources::SourceError;

/// Source lifecycle step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperation {
    Start,
    Stop,
    TakeEvents,
}

impl fmt::Display for SourceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            SourceOperation::Start => "start",
            SourceOperation::Stop => "stop",
            SourceOperation::TakeEvents => "hand out its event stream",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Source '{name}' failed to {operation}: {error}")]
    SourceLifecycle {
        name: String,
        operation: SourceOperation,
        error: SourceError,
    },

    #[error("Source '{name}' stopped producing: {error}")]
    SourceProduction { name: String, error: SourceError },

    #[error("Decider '{decider}' failed on {event} event: {error:#}")]
    Decision {
        decider: String,
        event: EventKind,
        error: anyhow::Error,
    },

    #[error("Sink '{sink}' failed to execute {action}: {error}")]
    Execution {
        sink: String,
        action: ActionKind,
        error: SinkError,
    },
}

impl EngineError {
    /// Whether this error stops the engine rather than one unit of work
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Configuration(_) | EngineError::AlreadyStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(EngineError::Configuration("no sink".to_string()).is_fatal());
        assert!(EngineError::AlreadyStarted.is_fatal());

        let decision = EngineError::Decision {
            decider: "arb".to_string(),
            event: EventKind::Log,
            error: anyhow::anyhow!("pool reserves unavailable"),
        };
        assert!(!decision.is_fatal());
        assert_eq!(
            decision.to_string(),
            "Decider 'arb' failed on log event: pool reserves unavailable"
        );
    }

    #[test]
    fn test_lifecycle_message() {
        let err = EngineError::SourceLifecycle {
            name: "headers".to_string(),
            operation: SourceOperation::Start,
            error: SourceError::AlreadyStarted,
        };
        assert_eq!(
            err.to_string(),
            "Source 'headers' failed to start: Source already started"
        );
    }
}
