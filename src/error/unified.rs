//! Error classification and per-server failure records.

use serde::{Deserialize, Serialize};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Network,
    Timeout,
    Remote,
    Lookup,
    Conflict,
    Lifecycle,
    ToolExecution,
    Serialization,
    InvalidInput,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    Connect,
    CheckConfiguration,
    IncreaseTimeout,
    NameServerExplicitly,
    ChooseAnotherName,
    CheckServerState,
    CheckToolImplementation,
    FixArguments,
}

/// One server's failure inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFailure {
    pub server: String,
    pub message: String,
}

impl ServerFailure {
    pub fn new(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            message: message.into(),
        }
    }
}

pub(crate) fn describe_failures(failures: &[ServerFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.server, failure.message))
        .collect::<Vec<_>>()
        .join("; ")
}
