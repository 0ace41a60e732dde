//! Hosts a weather MCP server and queries it through the toolkit's own client.
//!
//! Run with `RUST_LOG=mcp_toolkit=debug cargo run --example weather_server`.

use mcp_toolkit::prelude::*;
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> mcp_toolkit::error::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let toolkit = Toolkit::new(ToolkitMode::ClientAndServer);
    let server = toolkit.get_server_service()?;
    server.add_tool(
        "get_weather",
        "Current weather for a city",
        ToolBody::script(r#""The weather in " + city + " is sunny, temperature 25C""#),
    )?;
    server.add_tool(
        "celsius_to_fahrenheit",
        "Convert a temperature",
        ToolBody::native(
            ToolParameters::object().integer("celsius", "Degrees Celsius", true).build(),
            |args| async move {
                let celsius = args.raw()["celsius"].as_f64().unwrap_or_default();
                Ok(json!(celsius * 9.0 / 5.0 + 32.0))
            },
        ),
    )?;
    server.add_prompt(
        "packing_list",
        "What should I pack for {days} days in {city}?",
        Some("Packing advice".into()),
    )?;
    let url = server.start("weather", "127.0.0.1", 0).await?;
    println!("serving MCP at {url}");

    let client = toolkit.get_client_service()?;
    client.create(ClientTarget::single(url, TransportKind::StreamableHttp))?;
    client.connect(None).await?;

    for tool in toolkit.get_langchain_tools().await? {
        let reply = match tool.name() {
            "default__get_weather" => tool.invoke(json!({ "city": "Paris" })).await?,
            _ => tool.invoke(json!({ "celsius": 25 })).await?,
        };
        println!("{} -> {reply}", tool.name());
    }

    let mut variables = serde_json::Map::new();
    variables.insert("city".into(), json!("Paris"));
    variables.insert("days".into(), json!(3));
    for message in toolkit.load_prompt("packing_list", variables, None).await? {
        println!("{:?}: {}", message.role, message.text());
    }

    toolkit.shutdown().await
}
