//! Tool trait and the closure-backed tool descriptor.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use super::validation::validate_arguments;
use crate::error::ToolkitError;

/// Context available during tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Caller-supplied metadata, passed through untouched.
    pub metadata: serde_json::Value,
}

/// Where a descriptor's calls are routed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOrigin {
    /// Management operation of the client service.
    Client,
    /// Management operation of the server service.
    Server,
    /// Tool discovered on a connected remote server.
    Remote { server: String, tool: String },
    /// Tool registered on the locally hosted server.
    Hosted { name: String },
}

impl ToolOrigin {
    pub fn remote(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::Remote {
            server: server.into(),
            tool: tool.into(),
        }
    }

    pub fn hosted(name: impl Into<String>) -> Self {
        Self::Hosted { name: name.into() }
    }
}

/// Agent-framework tool interface.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as the agent calls it.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Which service the call is routed to.
    fn origin(&self) -> &ToolOrigin;

    /// Execute the tool with parsed arguments.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ToolkitError>;
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolkitError>> + Send>>
    + Send
    + Sync;

/// A single invocable capability: name, description, input schema and callback.
///
/// Descriptors are immutable. The callback usually closes over a service
/// handle plus the identity of the capability it routes to, so every call
/// observes the service's live state.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: ToolParameters,
    origin: ToolOrigin,
    handler: Arc<ToolHandler>,
}

impl ToolDescriptor {
    /// Create a descriptor from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        origin: ToolOrigin,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ToolkitError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            origin,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Validate arguments against the schema, then execute.
    pub async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolkitError> {
        validate_arguments(&arguments, &self.parameters.schema).map_err(|message| {
            ToolkitError::InvalidArgument(format!("{}: {message}", self.name))
        })?;
        self.execute(&ToolArguments::new(arguments), &ToolExecutionContext::default())
            .await
    }
}

#[async_trait]
impl Tool for ToolDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn origin(&self) -> &ToolOrigin {
        &self.origin
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ToolkitError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("origin", &self.origin)
            .finish()
    }
}
