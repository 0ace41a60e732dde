//! `rmcp` server handler over a live capability set.

use std::sync::Arc;
use std::time::Duration;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, GetPromptRequestParams, GetPromptResult,
    ListPromptsResult, ListResourcesResult, ListToolsResult, PaginatedRequestParams,
    ReadResourceRequestParams, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use serde_json::json;

use super::capability::CapabilitySet;

/// Answers MCP requests from whatever is registered at request time.
#[derive(Clone)]
pub(crate) struct CapabilityHandler {
    name: String,
    capabilities: Arc<CapabilitySet>,
    tool_timeout: Duration,
}

impl CapabilityHandler {
    pub(crate) fn new(name: String, capabilities: Arc<CapabilitySet>, tool_timeout: Duration) -> Self {
        Self {
            name,
            capabilities,
            tool_timeout,
        }
    }
}

fn internal(err: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(err.to_string(), None)
}

impl ServerHandler for CapabilityHandler {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder()
            .enable_tools()
            .enable_resources()
            .enable_prompts()
            .build();
        info.server_info.name = self.name.clone();
        info.server_info.version = env!("CARGO_PKG_VERSION").to_string();
        info.instructions = Some(format!(
            "Tools, resources and prompts registered on the '{}' toolkit server.",
            self.name
        ));
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self
            .capabilities
            .tools()
            .into_iter()
            .map(|tool| {
                serde_json::from_value(json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.parameters.schema,
                }))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let Some(tool) = self.capabilities.tool(&request.name) else {
            return Err(ErrorData::invalid_params(
                format!("unknown tool '{}'", request.name),
                None,
            ));
        };
        let arguments = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or_else(|| json!({}));

        match tool.execute(arguments, self.tool_timeout).await {
            Ok(serde_json::Value::String(text)) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Ok(value) => {
                let mut result = CallToolResult::success(vec![Content::text(value.to_string())]);
                result.structured_content = Some(value);
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(tool = %tool.name, error = %err, "hosted tool failed");
                Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
            }
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let resources = self
            .capabilities
            .resources()
            .into_iter()
            .map(|resource| {
                serde_json::from_value(json!({
                    "uri": resource.uri,
                    "name": resource.name,
                    "description": resource.description,
                    "mimeType": resource.mime_type(),
                }))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let resource = self.capabilities.resource_by_uri(&request.uri).ok_or_else(|| {
            ErrorData::resource_not_found(format!("no resource at '{}'", request.uri), None)
        })?;
        serde_json::from_value(json!({
            "contents": [{
                "uri": resource.uri,
                "mimeType": resource.mime_type(),
                "text": resource.text(),
            }]
        }))
        .map_err(internal)
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        let prompts = self
            .capabilities
            .prompts()
            .into_iter()
            .map(|prompt| {
                let arguments: Vec<_> = prompt
                    .variables
                    .iter()
                    .map(|name| json!({ "name": name, "required": true }))
                    .collect();
                serde_json::from_value(json!({
                    "name": prompt.name,
                    "description": prompt.description,
                    "arguments": arguments,
                }))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;
        Ok(ListPromptsResult::with_all_items(prompts))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        let prompt = self.capabilities.prompt(&request.name).ok_or_else(|| {
            ErrorData::invalid_params(format!("unknown prompt '{}'", request.name), None)
        })?;
        let arguments = request.arguments.unwrap_or_default();
        let text = prompt
            .render(&arguments)
            .map_err(|err| ErrorData::invalid_params(err.to_string(), None))?;
        serde_json::from_value(json!({
            "description": prompt.description,
            "messages": [{ "role": "user", "content": { "type": "text", "text": text } }],
        }))
        .map_err(internal)
    }
}
