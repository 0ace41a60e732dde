//! Toolkit façade: composes the services of one mode and hands out tool
//! descriptors for them.
//!
//! ```no_run
//! use mcp_toolkit::prelude::*;
//!
//! # async fn example() -> mcp_toolkit::error::Result<()> {
//! let toolkit = Toolkit::from_server_and_api_key("http://localhost:8000/mcp", "sk-demo")?;
//! toolkit.get_client_service()?.connect(None).await?;
//! for tool in toolkit.get_langchain_tools().await? {
//!     println!("{}: {}", tool.name(), tool.description());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::config::{ClientTarget, ServerBinding, ServerConfig, ToolkitConfig, ToolkitMode};
use crate::error::{Result, ToolkitError};
use crate::factory::MCPToolFactory;
use crate::mcp::session::RmcpConnector;
use crate::services::client::MCPClientService;
use crate::services::server::MCPServerService;
use crate::tools::tool::ToolDescriptor;
use crate::types::ModelMessage;

/// Exactly the services a mode carries.
enum Services {
    Client(Arc<MCPClientService>),
    Server(Arc<MCPServerService>),
    ClientAndServer {
        client: Arc<MCPClientService>,
        server: Arc<MCPServerService>,
    },
}

impl Services {
    fn mode(&self) -> ToolkitMode {
        match self {
            Self::Client(_) => ToolkitMode::Client,
            Self::Server(_) => ToolkitMode::Server,
            Self::ClientAndServer { .. } => ToolkitMode::ClientAndServer,
        }
    }

    fn client(&self) -> Option<&Arc<MCPClientService>> {
        match self {
            Self::Client(client) | Self::ClientAndServer { client, .. } => Some(client),
            Self::Server(_) => None,
        }
    }

    fn server(&self) -> Option<&Arc<MCPServerService>> {
        match self {
            Self::Server(server) | Self::ClientAndServer { server, .. } => Some(server),
            Self::Client(_) => None,
        }
    }
}

/// Entry point for agent code: services per mode plus descriptor generation.
pub struct Toolkit {
    services: Services,
    binding: ServerBinding,
}

impl Toolkit {
    fn assemble(
        mode: ToolkitMode,
        client: impl FnOnce() -> MCPClientService,
        server: impl FnOnce() -> MCPServerService,
        binding: ServerBinding,
    ) -> Self {
        let services = match mode {
            ToolkitMode::Client => Services::Client(Arc::new(client())),
            ToolkitMode::Server => Services::Server(Arc::new(server())),
            ToolkitMode::ClientAndServer => Services::ClientAndServer {
                client: Arc::new(client()),
                server: Arc::new(server()),
            },
        };
        tracing::debug!(mode = %mode, "toolkit assembled");
        Self { services, binding }
    }

    pub fn new(mode: ToolkitMode) -> Self {
        Self::assemble(
            mode,
            MCPClientService::new,
            MCPServerService::new,
            ServerBinding::default(),
        )
    }

    pub fn from_client() -> Self {
        Self::new(ToolkitMode::Client)
    }

    pub fn from_server() -> Self {
        Self::new(ToolkitMode::Server)
    }

    /// Client mode with the `default` server registered (not connected)
    /// and authenticated with `api_key`.
    pub fn from_server_and_api_key(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let toolkit = Self::from_client();
        toolkit
            .get_client_service()?
            .create(ClientTarget::Single(ServerConfig::sse(url).with_api_key(api_key)))?;
        Ok(toolkit)
    }

    /// Client mode; servers registered later without a credential use `api_key`.
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self::assemble(
            ToolkitMode::Client,
            || MCPClientService::new().with_default_api_key(api_key),
            MCPServerService::new,
            ServerBinding::default(),
        )
    }

    /// Build from a loaded configuration; configured servers are registered.
    pub fn from_config(config: ToolkitConfig) -> Result<Self> {
        config.validate()?;
        if !config.servers.is_empty() && !config.mode.has_client() {
            return Err(ToolkitError::Configuration(format!(
                "{} mode cannot register client servers",
                config.mode
            )));
        }
        let connect_timeout = config.connect_timeout();
        let tool_timeout = config.tool_timeout();
        let api_key = config.api_key.clone();
        let toolkit = Self::assemble(
            config.mode,
            || {
                let client = MCPClientService::with_connector(Arc::new(RmcpConnector::new(connect_timeout)))
                    .with_request_timeout(tool_timeout);
                match api_key {
                    Some(key) => client.with_default_api_key(key),
                    None => client,
                }
            },
            || MCPServerService::new().with_tool_timeout(tool_timeout),
            config.server,
        );

        if !config.servers.is_empty() {
            toolkit
                .get_client_service()?
                .create(ClientTarget::Multi(config.servers))?;
        }
        Ok(toolkit)
    }

    pub fn mode(&self) -> ToolkitMode {
        self.services.mode()
    }

    pub fn get_client_service(&self) -> Result<&Arc<MCPClientService>> {
        self.services.client().ok_or_else(|| self.mode_error("client"))
    }

    pub fn get_server_service(&self) -> Result<&Arc<MCPServerService>> {
        self.services.server().ok_or_else(|| self.mode_error("server"))
    }

    fn mode_error(&self, requested: &str) -> ToolkitError {
        ToolkitError::Mode {
            mode: self.mode().to_string(),
            requested: requested.to_string(),
        }
    }

    /// Management descriptors for every active service, plus hosted tools.
    pub fn get_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools = Vec::new();
        if let Some(client) = self.services.client() {
            tools.extend(MCPToolFactory::client_tools(client));
        }
        if let Some(server) = self.services.server() {
            tools.extend(MCPToolFactory::server_tools(server));
        }
        tools
    }

    /// Subset of [`get_tools`](Self::get_tools) in the requested order.
    pub fn get_tools_by_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolDescriptor> {
        MCPToolFactory::get_tools_by_names(&self.get_tools(), names)
    }

    /// Remote tools of every connected server.
    pub async fn get_langchain_tools(&self) -> Result<Vec<ToolDescriptor>> {
        MCPToolFactory::remote_tools(self.get_client_service()?).await
    }

    /// Render a remote prompt as chat messages.
    pub async fn load_prompt(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
        server: Option<&str>,
    ) -> Result<Vec<ModelMessage>> {
        self.get_client_service()?
            .get_langchain_prompt(name, arguments, server)
            .await
    }

    /// Register and connect the named servers on this toolkit's client.
    pub async fn create_multi_server_client<I, K, V>(&self, urls: I) -> Result<Arc<MCPClientService>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let client = self.get_client_service()?;
        client.create(ClientTarget::from_urls(urls))?;
        client.connect(None).await?;
        Ok(Arc::clone(client))
    }

    /// Register, connect and return the remote tools of the named servers.
    pub async fn get_tools_from_multiple_servers<I, K, V>(&self, urls: I) -> Result<Vec<ToolDescriptor>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let client = self.create_multi_server_client(urls).await?;
        client.get_langchain_tools().await
    }

    /// Start the local server on the configured binding.
    pub async fn start_server(&self) -> Result<String> {
        self.get_server_service()?.start_with(&self.binding).await
    }

    /// Disconnect clients and stop the local server.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(client) = self.services.client() {
            client.disconnect(None).await?;
        }
        if let Some(server) = self.services.server() {
            server.stop().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;

    #[test]
    fn services_outside_the_mode_report_mode_errors() {
        let client_only = Toolkit::from_client();
        let err = client_only.get_server_service().err().expect("no server in client mode");
        assert!(matches!(err, ToolkitError::Mode { mode, requested } if mode == "client" && requested == "server"));

        let server_only = Toolkit::from_server();
        assert!(matches!(server_only.get_client_service(), Err(ToolkitError::Mode { .. })));

        let both = Toolkit::new(ToolkitMode::ClientAndServer);
        assert!(both.get_client_service().is_ok());
        assert!(both.get_server_service().is_ok());
    }

    #[test]
    fn combined_mode_tool_names_are_disjoint() {
        let toolkit = Toolkit::new(ToolkitMode::ClientAndServer);
        let tools = toolkit.get_tools();
        assert_eq!(tools.len(), 16);

        let mut names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 16);
    }

    #[test]
    fn from_server_and_api_key_registers_default_server() {
        let toolkit = Toolkit::from_server_and_api_key("http://localhost:8000/mcp", "sk-demo")
            .expect("toolkit should build");
        let client = toolkit.get_client_service().expect("client mode");
        assert_eq!(client.server_names(), vec!["default".to_string()]);
        assert!(!client.is_connected("default"));

        assert!(Toolkit::from_server_and_api_key("not a url", "sk-demo").is_err());
    }

    #[test]
    fn from_config_rejects_servers_in_server_mode() {
        let config = ToolkitConfig::from_toml_str(
            r#"
            mode = "server"

            [servers.weather]
            url = "http://localhost:8000/mcp"
            "#,
        )
        .expect("config should parse");
        let err = Toolkit::from_config(config).err().expect("server mode has no client");
        assert!(matches!(err, ToolkitError::Configuration(_)));
    }

    #[tokio::test]
    async fn langchain_tools_need_client_mode() {
        let toolkit = Toolkit::from_server();
        let err = toolkit.get_langchain_tools().await.expect_err("server mode");
        assert!(matches!(err, ToolkitError::Mode { .. }));
    }
}
