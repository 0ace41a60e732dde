//! Error types for the toolkit.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion, ServerFailure};

use thiserror::Error;

use crate::sandbox::SandboxError;

/// Primary error type for all toolkit operations.
#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Server '{server}' is not connected")]
    NotConnected { server: String },

    #[error("Remote tool '{tool}' on server '{server}' failed: {message}")]
    RemoteTool {
        server: String,
        tool: String,
        message: String,
    },

    #[error("MCP server '{server}' returned an error: {message}")]
    Protocol { server: String, message: String },

    #[error("Failed to connect {} server(s): {}", .failures.len(), unified::describe_failures(.failures))]
    AggregateConnect { failures: Vec<ServerFailure> },

    #[error("Failed to list capabilities on {} server(s): {}", .failures.len(), unified::describe_failures(.failures))]
    AggregateList { failures: Vec<ServerFailure> },

    #[error("Prompt '{prompt}' is offered by several servers ({}); pass a server name", .servers.join(", "))]
    AmbiguousPrompt { prompt: String, servers: Vec<String> },

    #[error("Prompt '{0}' was not found on any connected server")]
    PromptNotFound(String),

    /// `url` is absent while the winning start is still binding.
    #[error("Server already running{}", .url.as_deref().map(|url| format!(" at {url}")).unwrap_or_else(|| " (still starting)".into()))]
    AlreadyRunning { url: Option<String> },

    #[error("Server is not running")]
    NotRunning,

    #[error("A {kind} named '{name}' is already registered")]
    DuplicateName { kind: CapabilityKind, name: String },

    #[error("{requested} service is not available in {mode} mode")]
    Mode { mode: String, requested: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Namespace of a capability hosted by the local server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl ToolkitError {
    /// Create a duplicate-name error for the given namespace.
    pub fn duplicate(kind: CapabilityKind, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    pub fn not_connected(server: impl Into<String>) -> Self {
        Self::NotConnected {
            server: server.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::Mode { .. } => ErrorCategory::Configuration,
            Self::NotConnected { .. } | Self::AggregateConnect { .. } => ErrorCategory::Connection,
            Self::Transport(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::RemoteTool { .. } => ErrorCategory::Remote,
            Self::AggregateList { .. } | Self::Protocol { .. } => ErrorCategory::Remote,
            Self::AmbiguousPrompt { .. } | Self::PromptNotFound(_) => ErrorCategory::Lookup,
            Self::DuplicateName { .. } => ErrorCategory::Conflict,
            Self::AlreadyRunning { .. } | Self::NotRunning | Self::InvalidState(_) => {
                ErrorCategory::Lifecycle
            }
            Self::ToolExecution { .. } | Self::Sandbox(_) => ErrorCategory::ToolExecution,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidArgument(_) => ErrorCategory::InvalidInput,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Connection
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Connection => RecoverySuggestion::Connect,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Lookup => RecoverySuggestion::NameServerExplicitly,
            ErrorCategory::Conflict => RecoverySuggestion::ChooseAnotherName,
            ErrorCategory::Lifecycle => RecoverySuggestion::CheckServerState,
            ErrorCategory::ToolExecution | ErrorCategory::Remote => {
                RecoverySuggestion::CheckToolImplementation
            }
            ErrorCategory::InvalidInput | ErrorCategory::Serialization => {
                RecoverySuggestion::FixArguments
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ToolkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_connect_message_names_every_failed_server() {
        let err = ToolkitError::AggregateConnect {
            failures: vec![
                ServerFailure::new("alpha", "connection refused"),
                ServerFailure::new("beta", "handshake timed out"),
            ],
        };

        let message = err.to_string();
        assert!(message.contains("2 server(s)"));
        assert!(message.contains("alpha: connection refused"));
        assert!(message.contains("beta: handshake timed out"));
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert!(err.is_retryable());
    }

    #[test]
    fn duplicate_name_reports_namespace() {
        let err = ToolkitError::duplicate(CapabilityKind::Resource, "readme");
        assert_eq!(err.to_string(), "A resource named 'readme' is already registered");
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::ChooseAnotherName);
        assert!(!err.is_retryable());
    }

    #[test]
    fn ambiguous_prompt_lists_servers() {
        let err = ToolkitError::AmbiguousPrompt {
            prompt: "summarize".into(),
            servers: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains("(a, b)"));
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::NameServerExplicitly);
    }

    #[test]
    fn already_running_names_the_url_once_bound() {
        let running = ToolkitError::AlreadyRunning {
            url: Some("http://127.0.0.1:8000/mcp".into()),
        };
        assert_eq!(running.to_string(), "Server already running at http://127.0.0.1:8000/mcp");

        let starting = ToolkitError::AlreadyRunning { url: None };
        assert_eq!(starting.to_string(), "Server already running (still starting)");
    }
}
