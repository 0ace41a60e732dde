//! Object-safe session seam between the client service and the MCP SDK.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::client::MCPClient;
use super::schema::{
    MCPPromptResult, MCPPromptSchema, MCPResourceContent, MCPResourceSchema, MCPToolSchema,
};
use super::transport::transport_for;
use crate::config::ServerConfig;
use crate::error::ToolkitError;
use crate::util::timeout::with_timeout;

/// Operations the client service performs on one live connection.
///
/// Methods take `&self`: requests on one session may run concurrently, and
/// `close` may race with them.
#[async_trait]
pub trait MCPSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<MCPToolSchema>, ToolkitError>;

    /// Call a tool; the result is structured content, else text, else raw content blocks.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolkitError>;

    async fn list_resources(&self) -> Result<Vec<MCPResourceSchema>, ToolkitError>;

    async fn read_resource(&self, uri: &str) -> Result<Vec<MCPResourceContent>, ToolkitError>;

    async fn list_prompts(&self) -> Result<Vec<MCPPromptSchema>, ToolkitError>;

    async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MCPPromptResult, ToolkitError>;

    async fn close(&self) -> Result<(), ToolkitError>;
}

#[async_trait]
impl MCPSession for MCPClient {
    async fn list_tools(&self) -> Result<Vec<MCPToolSchema>, ToolkitError> {
        MCPClient::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolkitError> {
        MCPClient::call_tool(self, name, arguments)
            .await
            .map(|result| result.into_value_or_text())
    }

    async fn list_resources(&self) -> Result<Vec<MCPResourceSchema>, ToolkitError> {
        MCPClient::list_resources(self).await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<MCPResourceContent>, ToolkitError> {
        MCPClient::read_resource(self, uri).await
    }

    async fn list_prompts(&self) -> Result<Vec<MCPPromptSchema>, ToolkitError> {
        MCPClient::list_prompts(self).await
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MCPPromptResult, ToolkitError> {
        MCPClient::get_prompt(self, name, arguments).await
    }

    async fn close(&self) -> Result<(), ToolkitError> {
        MCPClient::close(self).await
    }
}

/// Opens sessions for registry entries.
#[async_trait]
pub trait MCPConnector: Send + Sync {
    async fn connect(
        &self,
        server: &str,
        config: &ServerConfig,
    ) -> Result<Arc<dyn MCPSession>, ToolkitError>;
}

/// Connector backed by the rmcp transports.
#[derive(Debug, Clone)]
pub struct RmcpConnector {
    handshake_timeout: Duration,
}

impl RmcpConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for RmcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl MCPConnector for RmcpConnector {
    async fn connect(
        &self,
        server: &str,
        config: &ServerConfig,
    ) -> Result<Arc<dyn MCPSession>, ToolkitError> {
        let transport = transport_for(config)?;
        tracing::debug!(server, endpoint = %transport.endpoint(), transport = %config.transport, "connecting MCP server");
        let mut client = MCPClient::new(server, transport);
        with_timeout(self.handshake_timeout, client.initialize()).await?;
        Ok(Arc::new(client))
    }
}
