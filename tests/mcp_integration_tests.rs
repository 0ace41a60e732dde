use std::collections::HashSet;
use std::time::Duration;

use mcp_toolkit::config::{ClientTarget, ServerConfig};
use mcp_toolkit::error::ToolkitError;
use mcp_toolkit::services::client::{ConnectionState, MCPClientService};
use mcp_toolkit::tools::{Tool, ToolOrigin};
use serde_json::json;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn tool_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "query": { "type": "string" } }
    })
}

/// Stateless streamable-HTTP MCP provider answering with plain JSON bodies.
fn mock_mcp_handler(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let body: serde_json::Value = request.body_json().unwrap_or_else(|_| json!({}));
        let method = body.get("method").and_then(|value| value.as_str()).unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or_else(|| json!(1));
        let reply = |result: serde_json::Value| {
            ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
        };

        match method {
            "initialize" => reply(json!({
                "protocolVersion": "2025-03-26",
                "capabilities": { "tools": { "listChanged": false }, "prompts": {} },
                "serverInfo": { "name": server_name, "version": "0.1.0" }
            })),
            "tools/list" => {
                let definitions: Vec<_> = tools
                    .iter()
                    .map(|(name, description)| {
                        json!({ "name": name, "description": description, "inputSchema": tool_schema() })
                    })
                    .collect();
                reply(json!({ "tools": definitions, "nextCursor": null }))
            }
            "tools/call" => {
                let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
                let called = params.get("name").and_then(|name| name.as_str()).unwrap_or_default();
                reply(json!({
                    "content": [{ "type": "text", "text": format!("{server_name}:{called}") }],
                    "structuredContent": {
                        "server": server_name,
                        "tool": called,
                        "arguments": params.get("arguments").cloned().unwrap_or_else(|| json!({}))
                    },
                    "isError": false
                }))
            }
            "prompts/list" => reply(json!({
                "prompts": [{ "name": "summarize", "description": "Summarize a topic" }],
                "nextCursor": null
            })),
            "notifications/initialized" => ResponseTemplate::new(202),
            _ => reply(json!({})),
        }
    }
}

async fn mock_provider(
    server_name: &'static str,
    tools: &'static [(&'static str, &'static str)],
) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(mock_mcp_handler(server_name, tools))
        .mount(&server)
        .await;
    server
}

fn request_methods(requests: &[Request]) -> HashSet<String> {
    requests
        .iter()
        .filter_map(|request| {
            request
                .body_json::<serde_json::Value>()
                .ok()
                .and_then(|body| body.get("method").and_then(|m| m.as_str()).map(str::to_string))
        })
        .collect()
}

#[tokio::test]
async fn http_provider_receives_credentials_and_custom_headers() {
    let provider = mock_provider("alpha", &[("search", "Alpha search")]).await;
    let client = MCPClientService::new().with_default_api_key("sk-test");
    client
        .create(ClientTarget::Single(
            ServerConfig::streamable_http(format!("{}/mcp", provider.uri())).with_header("x-scope", "qa"),
        ))
        .expect("create should succeed");

    timeout(Duration::from_secs(5), client.connect(None))
        .await
        .expect("connect should finish in time")
        .expect("connect should succeed");
    let listing = client.list_tools(Some("default")).await.expect("tools/list");
    assert_eq!(listing.items[0].item.name, "search");
    assert_eq!(listing.items[0].server, "default");

    let requests = provider.received_requests().await.expect("requests are recorded");
    let methods = request_methods(&requests);
    assert!(methods.contains("initialize"));
    assert!(methods.contains("tools/list"));
    assert!(requests.iter().all(|request| {
        request.headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer sk-test")
            && request.headers.get("x-scope").and_then(|v| v.to_str().ok()) == Some("qa")
    }));
}

#[tokio::test]
async fn multi_server_tools_are_namespaced_and_routed() {
    let alpha = mock_provider("alpha", &[("search", "Alpha search")]).await;
    let beta = mock_provider("beta", &[("search", "Beta search"), ("fetch", "Beta fetch")]).await;

    let client = std::sync::Arc::new(MCPClientService::new());
    client
        .create(ClientTarget::from_urls([
            ("alpha", format!("{}/mcp", alpha.uri())),
            ("beta", format!("{}/mcp", beta.uri())),
        ]))
        .expect("create should succeed");
    client.connect(None).await.expect("both servers connect");

    let tools = client.get_langchain_tools().await.expect("tools should list");
    let names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
    assert_eq!(names, vec!["alpha__search", "beta__fetch", "beta__search"]);

    let beta_search = &tools[2];
    assert_eq!(beta_search.origin(), &ToolOrigin::remote("beta", "search"));
    let result = beta_search
        .invoke(json!({ "query": "rust" }))
        .await
        .expect("routed call should succeed");
    assert_eq!(result["server"], "beta");
    assert_eq!(result["arguments"]["query"], "rust");
}

#[tokio::test]
async fn unreachable_server_fails_alone() {
    let alpha = mock_provider("alpha", &[("search", "Alpha search")]).await;
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let client = MCPClientService::new();
    client
        .create(ClientTarget::from_urls([
            ("alpha", format!("{}/mcp", alpha.uri())),
            ("down", format!("http://127.0.0.1:{closed_port}/mcp")),
        ]))
        .expect("create should succeed");

    let err = timeout(Duration::from_secs(10), client.connect(None))
        .await
        .expect("connect should finish in time")
        .expect_err("down is unreachable");
    assert!(matches!(&err, ToolkitError::AggregateConnect { failures } if failures.len() == 1 && failures[0].server == "down"));

    assert_eq!(client.server_names(), vec!["alpha".to_string(), "down".to_string()]);
    assert!(matches!(client.connection_state("down"), Some(ConnectionState::Failed { .. })));
    let err = client
        .call_tool("down", "search", json!({}))
        .await
        .expect_err("down is not connected");
    assert!(matches!(err, ToolkitError::NotConnected { .. }));

    let result = client
        .call_tool("alpha", "search", json!({ "query": "ok" }))
        .await
        .expect("alpha still works");
    assert_eq!(result["tool"], "search");
}
