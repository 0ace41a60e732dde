//! Turns service capabilities into tool descriptors.
//!
//! Every descriptor closes over a service handle plus the identity of what it
//! routes to, so calls always see live state. Nothing here is cached: each
//! call enumerates afresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::{ClientTarget, ServerBinding, ServerConfig, TransportKind};
use crate::error::{Result, ToolkitError};
use crate::services::client::MCPClientService;
use crate::services::server::{MCPServerService, ToolBody};
use crate::tools::arguments::ToolArguments;
use crate::tools::tool::{Tool, ToolDescriptor, ToolOrigin};
use crate::tools::types::ToolParameters;
use crate::util::naming::namespaced;

/// Prefix of descriptors for tools hosted by the local server.
pub const HOSTED_TOOL_PREFIX: &str = "local";

const TRANSPORTS: &[&str] = &["sse", "streamable_http", "stdio"];

/// Stateless descriptor factory.
pub struct MCPToolFactory;

#[derive(Deserialize)]
struct CreateArgs {
    url: Option<String>,
    #[serde(default)]
    transport: TransportKind,
    servers: Option<BTreeMap<String, ServerConfig>>,
}

#[derive(Deserialize)]
struct CallArgs {
    server: String,
    tool: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct PromptArgs {
    name: String,
    server: Option<String>,
    #[serde(default, alias = "variables")]
    arguments: Map<String, Value>,
}

fn client_tool<F, Fut>(
    client: &Arc<MCPClientService>,
    name: &str,
    description: &str,
    parameters: ToolParameters,
    run: F,
) -> ToolDescriptor
where
    F: Fn(Arc<MCPClientService>, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    let client = Arc::clone(client);
    ToolDescriptor::new(name, description, parameters, ToolOrigin::Client, move |args, _ctx| {
        run(Arc::clone(&client), args)
    })
}

fn server_tool<F, Fut>(
    server: &Arc<MCPServerService>,
    name: &str,
    description: &str,
    parameters: ToolParameters,
    run: F,
) -> ToolDescriptor
where
    F: Fn(Arc<MCPServerService>, ToolArguments) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    let server = Arc::clone(server);
    ToolDescriptor::new(name, description, parameters, ToolOrigin::Server, move |args, _ctx| {
        run(Arc::clone(&server), args)
    })
}

fn optional_server() -> ToolParameters {
    ToolParameters::object()
        .string("server", "Server name; omit to cover every connected server", false)
        .build()
}

impl MCPToolFactory {
    /// Management operations of the client service.
    pub fn client_tools(client: &Arc<MCPClientService>) -> Vec<ToolDescriptor> {
        vec![
            client_tool(
                client,
                "client_create",
                "Register MCP servers: either `url` (+ `transport`) for one server, or `servers` mapping names to {url, transport}",
                ToolParameters::object()
                    .string("url", "URL of a single server", false)
                    .string_enum("transport", "Transport of the single server", TRANSPORTS, false)
                    .object("servers", "Named servers: name -> {url, transport}", false)
                    .build(),
                |client, args| async move {
                    let parsed: CreateArgs = args.deserialize()?;
                    let target = match (parsed.servers, parsed.url) {
                        (Some(servers), _) => ClientTarget::Multi(servers),
                        (None, Some(url)) => ClientTarget::Single(ServerConfig::http(url, parsed.transport)),
                        (None, None) => {
                            return Err(ToolkitError::InvalidArgument(
                                "client_create needs `url` or `servers`".into(),
                            ))
                        }
                    };
                    client.create(target)?;
                    Ok(json!({ "servers": client.server_names() }))
                },
            ),
            client_tool(
                client,
                "client_connect",
                "Connect a registered server, or every registered server when `server` is omitted",
                optional_server(),
                |client, args| async move {
                    client.connect(args.get_str_opt("server")).await?;
                    let states: Map<String, Value> = client
                        .server_names()
                        .into_iter()
                        .map(|name| {
                            let state = serde_json::to_value(client.connection_state(&name))
                                .unwrap_or(Value::Null);
                            (name, state)
                        })
                        .collect();
                    Ok(Value::Object(states))
                },
            ),
            client_tool(
                client,
                "client_call_tool",
                "Call a tool on a connected server",
                ToolParameters::object()
                    .string("server", "Server name", true)
                    .string("tool", "Tool name on that server", true)
                    .object("arguments", "Tool arguments", false)
                    .build(),
                |client, args| async move {
                    let call: CallArgs = args.deserialize()?;
                    client.call_tool(&call.server, &call.tool, call.arguments).await
                },
            ),
            client_tool(
                client,
                "client_list_tools",
                "List tools, tagged with the server that offers them",
                optional_server(),
                |client, args| async move {
                    let listing = client.list_tools(args.get_str_opt("server")).await?;
                    Ok(serde_json::to_value(listing)?)
                },
            ),
            client_tool(
                client,
                "client_list_resources",
                "List resources, tagged with the server that offers them",
                optional_server(),
                |client, args| async move {
                    let listing = client.list_resources(args.get_str_opt("server")).await?;
                    Ok(serde_json::to_value(listing)?)
                },
            ),
            client_tool(
                client,
                "client_read_resource",
                "Read a resource by URI from a connected server",
                ToolParameters::object()
                    .string("server", "Server name", true)
                    .string("uri", "Resource URI", true)
                    .build(),
                |client, args| async move {
                    let contents = client
                        .read_resource(args.get_str("server")?, args.get_str("uri")?)
                        .await?;
                    Ok(Value::Array(contents.iter().map(|c| c.to_value()).collect()))
                },
            ),
            client_tool(
                client,
                "client_list_prompts",
                "List prompts, tagged with the server that offers them",
                optional_server(),
                |client, args| async move {
                    let listing = client.list_prompts(args.get_str_opt("server")).await?;
                    Ok(serde_json::to_value(listing)?)
                },
            ),
            client_tool(
                client,
                "client_get_prompt",
                "Render a prompt from a connected server",
                ToolParameters::object()
                    .string("server", "Server name", true)
                    .string("name", "Prompt name", true)
                    .object("arguments", "Prompt arguments", false)
                    .build(),
                |client, args| async move {
                    let prompt: PromptArgs = args.deserialize()?;
                    let server = prompt.server.ok_or_else(|| {
                        ToolkitError::InvalidArgument("missing required field 'server'".into())
                    })?;
                    let rendered = client.get_prompt(&server, &prompt.name, prompt.arguments).await?;
                    Ok(serde_json::to_value(rendered)?)
                },
            ),
            client_tool(
                client,
                "get_langchain_tools",
                "Describe every remote tool as `<server>__<tool>`",
                ToolParameters::empty(),
                |client, _args| async move {
                    let tools = Self::remote_tools(&client).await?;
                    Ok(Value::Array(tools.iter().map(describe).collect()))
                },
            ),
            client_tool(
                client,
                "get_langchain_prompt",
                "Render a prompt as chat messages; `server` is required when several servers offer it",
                ToolParameters::object()
                    .string("name", "Prompt name", true)
                    .object("variables", "Prompt variables", false)
                    .string("server", "Server name", false)
                    .build(),
                |client, args| async move {
                    let prompt: PromptArgs = args.deserialize()?;
                    let messages = client
                        .get_langchain_prompt(&prompt.name, prompt.arguments, prompt.server.as_deref())
                        .await?;
                    Ok(serde_json::to_value(messages)?)
                },
            ),
        ]
    }

    /// Management operations of the server service, followed by one
    /// `local__<name>` descriptor per hosted tool.
    pub fn server_tools(server: &Arc<MCPServerService>) -> Vec<ToolDescriptor> {
        let mut tools = vec![
            server_tool(
                server,
                "server_start",
                "Start the local MCP server",
                ToolParameters::object()
                    .string("name", "Server name", false)
                    .string("host", "Bind host", false)
                    .integer("port", "Bind port; 0 picks a free port", false)
                    .build(),
                |server, args| async move {
                    let defaults = ServerBinding::default();
                    let url = server
                        .start(
                            args.get_str_opt("name").unwrap_or(&defaults.name),
                            args.get_str_opt("host").unwrap_or(&defaults.host),
                            args.get_u16_opt("port")?.unwrap_or(defaults.port),
                        )
                        .await?;
                    Ok(json!({ "url": url }))
                },
            ),
            server_tool(
                server,
                "server_stop",
                "Stop the local MCP server",
                ToolParameters::empty(),
                |server, _args| async move {
                    server.stop().await?;
                    Ok(json!({ "state": server.state() }))
                },
            ),
            server_tool(
                server,
                "server_get_url",
                "URL of the running local MCP server",
                ToolParameters::empty(),
                |server, _args| async move { Ok(json!({ "url": server.get_url()? })) },
            ),
            server_tool(
                server,
                "server_add_tool",
                "Register a tool whose body is a sandboxed expression over its arguments",
                ToolParameters::object()
                    .string("name", "Tool name", true)
                    .string("description", "What the tool does", true)
                    .string("code", "Expression, e.g. \"Hello \" + name", true)
                    .build(),
                |server, args| async move {
                    let name = args.get_str("name")?;
                    server.add_tool(
                        name,
                        args.get_str("description")?,
                        ToolBody::script(args.get_str("code")?),
                    )?;
                    Ok(json!({ "added": name }))
                },
            ),
            server_tool(
                server,
                "server_add_resource",
                "Publish a text or JSON resource at resource://<name>",
                ToolParameters::object()
                    .string("name", "Resource name", true)
                    .any("content", "Text or JSON content", true)
                    .string("description", "Resource description", false)
                    .build(),
                |server, args| async move {
                    let name = args.get_str("name")?;
                    server.add_resource(
                        name,
                        args.get_value("content"),
                        args.get_str_opt("description").map(str::to_string),
                    )?;
                    Ok(json!({ "added": name, "uri": format!("resource://{name}") }))
                },
            ),
            server_tool(
                server,
                "server_add_prompt",
                "Register a prompt template with {variable} placeholders",
                ToolParameters::object()
                    .string("name", "Prompt name", true)
                    .string("template", "Template text", true)
                    .string("description", "Prompt description", false)
                    .build(),
                |server, args| async move {
                    let name = args.get_str("name")?;
                    server.add_prompt(
                        name,
                        args.get_str("template")?,
                        args.get_str_opt("description").map(str::to_string),
                    )?;
                    Ok(json!({ "added": name }))
                },
            ),
        ];
        tools.extend(Self::hosted_tools(server));
        tools
    }

    /// One descriptor per tool currently in the capability set.
    pub fn hosted_tools(server: &Arc<MCPServerService>) -> Vec<ToolDescriptor> {
        server
            .capabilities()
            .tools()
            .into_iter()
            .map(|tool| {
                let server = Arc::clone(server);
                let hosted = tool.name.clone();
                ToolDescriptor::new(
                    namespaced(HOSTED_TOOL_PREFIX, &tool.name),
                    tool.description,
                    tool.parameters,
                    ToolOrigin::hosted(&tool.name),
                    move |args, _ctx| {
                        let server = Arc::clone(&server);
                        let hosted = hosted.clone();
                        async move { server.call_tool(&hosted, args.into_raw()).await }
                    },
                )
            })
            .collect()
    }

    /// One descriptor per remote tool of every connected server.
    pub async fn remote_tools(client: &Arc<MCPClientService>) -> Result<Vec<ToolDescriptor>> {
        client.get_langchain_tools().await
    }

    /// Pick descriptors by name, in the requested order; unknown names are skipped.
    pub fn get_tools_by_names<S: AsRef<str>>(tools: &[ToolDescriptor], names: &[S]) -> Vec<ToolDescriptor> {
        names
            .iter()
            .filter_map(|name| tools.iter().find(|tool| tool.name() == name.as_ref()).cloned())
            .collect()
    }
}

fn describe(tool: &ToolDescriptor) -> Value {
    json!({
        "name": tool.name(),
        "description": tool.description(),
        "parameters": tool.parameters().schema,
        "origin": tool.origin(),
    })
}
