//! Connects to several MCP servers and lists their tools by origin.
//!
//! ```text
//! cargo run --example multi_server_client -- weather=http://localhost:8000/mcp files=http://localhost:8001/mcp
//! ```

use mcp_toolkit::prelude::*;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> mcp_toolkit::error::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let servers: Vec<(String, String)> = std::env::args()
        .skip(1)
        .filter_map(|arg| {
            arg.split_once('=')
                .map(|(name, url)| (name.to_string(), url.to_string()))
        })
        .collect();
    if servers.is_empty() {
        eprintln!("usage: multi_server_client name=url [name=url ...]");
        return Ok(());
    }

    let toolkit = Toolkit::from_config(ToolkitConfig::from_env()?)?;
    let client = toolkit.get_client_service()?;
    client.create(ClientTarget::from_urls(servers))?;

    if let Err(err) = client.connect(None).await {
        eprintln!("{err}");
    }
    for name in client.server_names() {
        println!("{name}: {:?}", client.connection_state(&name));
    }

    let listing = client.list_tools(None).await?;
    for entry in &listing.items {
        println!(
            "[{}] {} - {}",
            entry.server,
            entry.item.name,
            entry.item.description.as_deref().unwrap_or_default()
        );
    }
    for failure in &listing.failures {
        eprintln!("[{}] listing failed: {}", failure.server, failure.message);
    }

    toolkit.shutdown().await
}
