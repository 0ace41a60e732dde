//! mcp-toolkit: Model Context Protocol servers as agent tools.
//!
//! Connects to any number of named MCP servers and exposes their tools,
//! resources and prompts as framework-native [`ToolDescriptor`]s. It can also
//! host a local MCP server whose tools, resources and prompts are registered
//! at runtime.
//!
//! # Quick Start
//!
//! ```no_run
//! use mcp_toolkit::prelude::*;
//!
//! # async fn example() -> mcp_toolkit::error::Result<()> {
//! let toolkit = Toolkit::new(ToolkitMode::ClientAndServer);
//!
//! let server = toolkit.get_server_service()?;
//! server.add_tool(
//!     "get_weather",
//!     "Current weather for a city",
//!     ToolBody::script(r#""The weather in " + city + " is sunny, temperature 25C""#),
//! )?;
//! let url = server.start("weather", "127.0.0.1", 0).await?;
//!
//! let client = toolkit.get_client_service()?;
//! client.create(ClientTarget::single(url, TransportKind::StreamableHttp))?;
//! client.connect(None).await?;
//! let reply = client
//!     .call_tool("default", "get_weather", serde_json::json!({ "city": "Paris" }))
//!     .await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```
//!
//! [`ToolDescriptor`]: tools::ToolDescriptor

pub mod config;
pub mod error;
pub mod factory;
pub mod mcp;
pub mod prelude;
pub mod sandbox;
pub mod services;
pub mod toolkit;
pub mod tools;
pub mod types;
pub mod util;
