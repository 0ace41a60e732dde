//! MCP transport layer.

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService};

use crate::config::{ServerConfig, TransportKind};
use crate::error::ToolkitError;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type MCPRunningService = RunningService<RoleClient, DynClientService>;

/// Opens an initialized rmcp client session.
#[async_trait]
pub trait MCPTransport: Send {
    /// Create and initialize a new rmcp running service for this transport.
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError>;

    /// Short human-readable endpoint, for logs.
    fn endpoint(&self) -> String;
}

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

/// Build the transport a server configuration asks for.
pub fn transport_for(config: &ServerConfig) -> Result<Box<dyn MCPTransport>, ToolkitError> {
    match config.transport {
        TransportKind::StreamableHttp | TransportKind::Sse => {
            Ok(Box::new(HttpTransport::from_config(config)?))
        }
        TransportKind::Stdio => {
            let command = config.command.clone().ok_or_else(|| {
                ToolkitError::Configuration("stdio transport requires a command".into())
            })?;
            Ok(Box::new(StdioTransport::new(command, config.args.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_for_picks_endpoint_by_kind() {
        let http = transport_for(&ServerConfig::streamable_http("http://localhost:9/mcp"))
            .expect("http transport should build");
        assert_eq!(http.endpoint(), "http://localhost:9/mcp");

        let stdio = transport_for(&ServerConfig::stdio("node", vec!["server.js".into()]))
            .expect("stdio transport should build");
        assert_eq!(stdio.endpoint(), "node server.js");
    }

    #[test]
    fn transport_for_rejects_stdio_without_command() {
        let config = ServerConfig::builder().transport(TransportKind::Stdio).build();
        assert!(matches!(transport_for(&config), Err(ToolkitError::Configuration(_))));
    }
}
