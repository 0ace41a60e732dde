//! MCP client for one named server connection.

use std::sync::{Mutex, MutexGuard};

use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, JsonObject, ProtocolVersion,
        ResourceContents,
    },
    service::{ClientInitializeError, Peer, RoleClient, ServiceError},
};
use serde::de::DeserializeOwned;

use super::schema::{
    MCPPromptResult, MCPPromptSchema, MCPResourceContent, MCPResourceSchema, MCPToolSchema,
};
use super::transport::{MCPRunningService, MCPTransport};
use crate::error::ToolkitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCPConnectionState {
    Disconnected,
    Initialized,
    Closed,
}

/// Payload of a successful `tools/call`.
#[derive(Debug, Clone)]
pub struct MCPToolCallResult {
    pub structured_content: Option<serde_json::Value>,
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

impl MCPToolCallResult {
    pub fn into_value_or_text(self) -> serde_json::Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        if let Some(text) = self.text_content {
            return serde_json::Value::String(text);
        }
        serde_json::Value::Array(self.content)
    }
}

/// Live state of the underlying rmcp session.
enum Connection {
    Pending,
    Live(MCPRunningService),
    Closed,
}

/// Client for a single Model Context Protocol server.
///
/// `server` is the registry name used in error messages and logs. Requests
/// take `&self` and run on a cloned rmcp peer, so several can be in flight
/// at once; only `initialize` and `close` change the connection.
pub struct MCPClient {
    server: String,
    transport: Mutex<Option<Box<dyn MCPTransport>>>,
    connection: Mutex<Connection>,
}

impl MCPClient {
    /// Create a new MCP client with the given transport.
    pub fn new(server: impl Into<String>, transport: Box<dyn MCPTransport>) -> Self {
        Self {
            server: server.into(),
            transport: Mutex::new(Some(transport)),
            connection: Mutex::new(Connection::Pending),
        }
    }

    /// Wrap an already-running rmcp service.
    pub fn from_running_service(server: impl Into<String>, session: MCPRunningService) -> Self {
        Self {
            server: server.into(),
            transport: Mutex::new(None),
            connection: Mutex::new(Connection::Live(session)),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn connection_state(&self) -> MCPConnectionState {
        match self.connection.lock().as_deref() {
            Ok(Connection::Live(_)) => MCPConnectionState::Initialized,
            Ok(Connection::Pending) => MCPConnectionState::Disconnected,
            Ok(Connection::Closed) | Err(_) => MCPConnectionState::Closed,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.peer().is_ok()
    }

    /// Open the transport and run the MCP handshake.
    pub async fn initialize(&mut self) -> Result<(), ToolkitError> {
        match self.connection_state() {
            MCPConnectionState::Initialized if self.is_initialized() => return Ok(()),
            MCPConnectionState::Closed => return Err(self.closed_error()),
            _ => {}
        }

        let session = self.connect_with_protocol_fallback().await?;
        tracing::debug!(
            server = %self.server,
            peer = ?session.peer_info().map(|info| info.server_info.name.clone()),
            "MCP session initialized"
        );
        *self.connection()? = Connection::Live(session);
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<MCPToolSchema>, ToolkitError> {
        let peer = self.peer()?;
        let tools = match peer.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => peer
                .list_tools(None)
                .await
                .map(|page| page.tools)
                .map_err(|e| map_service_error(&self.server, "tools/list", e))?,
            Err(error) => return Err(map_service_error(&self.server, "tools/list", error)),
        };
        Ok(tools.into_iter().map(map_mcp_tool_schema).collect())
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<MCPToolCallResult, ToolkitError> {
        let arguments = coerce_tool_arguments(arguments)?;
        let peer = self.peer()?;
        let result = peer
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|error| match error {
                ServiceError::McpError(error) => ToolkitError::RemoteTool {
                    server: self.server.clone(),
                    tool: name.to_string(),
                    message: format!("MCP error {}: {}", error.code.0, error.message),
                },
                other => map_service_error(&self.server, "tools/call", other),
            })?;
        map_call_result(&self.server, name, result)
    }

    pub async fn list_resources(&self) -> Result<Vec<MCPResourceSchema>, ToolkitError> {
        let resources = self
            .peer()?
            .list_all_resources()
            .await
            .map_err(|e| map_service_error(&self.server, "resources/list", e))?;
        resources.iter().map(reshape).collect()
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<MCPResourceContent>, ToolkitError> {
        let peer = self.peer()?;
        let params = serde_json::from_value(serde_json::json!({ "uri": uri }))?;
        let result = peer
            .read_resource(params)
            .await
            .map_err(|e| map_service_error(&self.server, "resources/read", e))?;
        Ok(result.contents.iter().map(map_resource_contents).collect())
    }

    pub async fn list_prompts(&self) -> Result<Vec<MCPPromptSchema>, ToolkitError> {
        let prompts = self
            .peer()?
            .list_all_prompts()
            .await
            .map_err(|e| map_service_error(&self.server, "prompts/list", e))?;
        prompts.iter().map(reshape).collect()
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MCPPromptResult, ToolkitError> {
        let peer = self.peer()?;
        let params = serde_json::from_value(serde_json::json!({
            "name": name,
            "arguments": stringify_prompt_arguments(arguments),
        }))?;
        let result = peer
            .get_prompt(params)
            .await
            .map_err(|e| map_service_error(&self.server, "prompts/get", e))?;
        reshape(&result)
    }

    /// Cancel the session. Idempotent. Requests still in flight end with a
    /// transport error.
    pub async fn close(&self) -> Result<(), ToolkitError> {
        let previous = std::mem::replace(&mut *self.connection()?, Connection::Closed);
        if let Ok(mut transport) = self.transport.lock() {
            transport.take();
        }
        if let Connection::Live(session) = previous {
            session
                .cancel()
                .await
                .map_err(|e| ToolkitError::Transport(format!("{}: failed to stop MCP session: {e}", self.server)))?;
        }
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, ToolkitError> {
        self.connection
            .lock()
            .map_err(|_| ToolkitError::InvalidState(format!("{}: MCP connection lock poisoned", self.server)))
    }

    /// Handle for one request; the connection lock is released before it is used.
    fn peer(&self) -> Result<Peer<RoleClient>, ToolkitError> {
        match &*self.connection()? {
            Connection::Live(session) if !session.is_closed() => Ok(session.peer().clone()),
            Connection::Live(_) | Connection::Closed => Err(self.closed_error()),
            Connection::Pending => Err(ToolkitError::not_connected(&self.server)),
        }
    }

    fn closed_error(&self) -> ToolkitError {
        ToolkitError::Transport(format!("{}: MCP session is closed", self.server))
    }

    async fn connect_with_protocol_fallback(&mut self) -> Result<MCPRunningService, ToolkitError> {
        let server = self.server.clone();
        let transport = self
            .transport
            .get_mut()
            .map_err(|_| ToolkitError::InvalidState(format!("{server}: MCP transport lock poisoned")))?
            .as_mut()
            .ok_or_else(|| ToolkitError::Configuration(format!("{server}: missing MCP transport")))?;

        let latest_client_info = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };

        match transport.connect(latest_client_info).await {
            Ok(session) => return Ok(session),
            Err(error) if should_retry_protocol_fallback(&error) => {
                tracing::debug!(server = %server, "retrying MCP handshake with 2024-11-05 protocol");
            }
            Err(error) => return Err(map_client_initialize_error(&server, error)),
        }

        let fallback_client_info = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            ..Default::default()
        };
        transport
            .connect(fallback_client_info)
            .await
            .map_err(|error| map_client_initialize_error(&server, error))
    }
}

fn should_retry_protocol_fallback(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

/// Convert an SDK model type into the toolkit's plain schema through JSON.
fn reshape<S: serde::Serialize, T: DeserializeOwned>(value: &S) -> Result<T, ToolkitError> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

fn map_mcp_tool_schema(tool: rmcp::model::Tool) -> MCPToolSchema {
    MCPToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn map_resource_contents(contents: &ResourceContents) -> MCPResourceContent {
    match contents {
        ResourceContents::TextResourceContents {
            uri,
            mime_type,
            text,
            ..
        } => MCPResourceContent {
            uri: uri.clone(),
            mime_type: mime_type.clone(),
            text: Some(text.clone()),
            blob: None,
        },
        ResourceContents::BlobResourceContents {
            uri,
            mime_type,
            blob,
            ..
        } => MCPResourceContent {
            uri: uri.clone(),
            mime_type: mime_type.clone(),
            text: None,
            blob: Some(blob.clone()),
        },
    }
}

/// MCP prompt arguments are string-valued.
fn stringify_prompt_arguments(
    arguments: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    arguments
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, serde_json::Value::String(text))
        })
        .collect()
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>, ToolkitError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                ToolkitError::InvalidArgument(format!("MCP tool arguments must be valid JSON: {e}"))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(ToolkitError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(
    server: &str,
    name: &str,
    result: CallToolResult,
) -> Result<MCPToolCallResult, ToolkitError> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| text_content.clone())
            .unwrap_or_else(|| "MCP tool returned an error result".into());

        return Err(ToolkitError::RemoteTool {
            server: server.to_string(),
            tool: name.to_string(),
            message,
        });
    }

    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect::<Vec<_>>();

    Ok(MCPToolCallResult {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}

fn map_client_initialize_error(server: &str, error: ClientInitializeError) -> ToolkitError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            ToolkitError::Transport(format!("{server}: MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => ToolkitError::Transport(
            format!("{server}: MCP initialize transport error ({context}): {error}"),
        ),
        ClientInitializeError::JsonRpcError(error) => ToolkitError::Protocol {
            server: server.to_string(),
            message: format!(
                "initialize JSON-RPC error {}: {}",
                error.code.0, error.message
            ),
        },
        ClientInitializeError::Cancelled => {
            ToolkitError::Transport(format!("{server}: MCP initialize cancelled"))
        }
        other => ToolkitError::Protocol {
            server: server.to_string(),
            message: format!("initialize error: {other}"),
        },
    }
}

fn map_service_error(server: &str, context: &str, error: ServiceError) -> ToolkitError {
    match error {
        ServiceError::McpError(error) => ToolkitError::Protocol {
            server: server.to_string(),
            message: format!("{context}: MCP error {}: {}", error.code.0, error.message),
        },
        ServiceError::TransportSend(error) => {
            ToolkitError::Transport(format!("{server}: {context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            ToolkitError::Transport(format!("{server}: {context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => ToolkitError::Protocol {
            server: server.to_string(),
            message: format!("{context}: unexpected MCP response"),
        },
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            ToolkitError::Transport(format!("{server}: {context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => ToolkitError::Timeout(timeout.as_millis() as u64),
        other => ToolkitError::Protocol {
            server: server.to_string(),
            message: format!("{context}: MCP service error: {other}"),
        },
    }
}
