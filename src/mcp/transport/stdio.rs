use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, ServiceExt};
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;

use super::{MCPRunningService, MCPTransport};

/// Stdio-based MCP transport (for local MCP servers).
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl MCPTransport for StdioTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        let transport = TokioChildProcess::new(command).map_err(|error| {
            ClientInitializeError::transport::<TokioChildProcess>(error, "spawn stdio transport")
        })?;

        client_info.into_dyn().serve(transport).await
    }

    fn endpoint(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_constructor_keeps_command_and_args() {
        let transport = StdioTransport::new("node", vec!["server.js".into(), "--debug".into()]);
        assert_eq!(transport.command(), "node");
        assert_eq!(transport.args(), &["server.js".to_string(), "--debug".to_string()]);
    }

    #[tokio::test]
    async fn missing_binary_fails_to_connect() {
        let mut transport = StdioTransport::new("definitely-not-an-mcp-server-binary", Vec::new());
        let result = transport.connect(ClientInfo::default()).await;
        assert!(result.is_err());
    }
}
