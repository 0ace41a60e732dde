//! Configuration (layered: code > env > TOML file).

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ToolkitError;

/// Name under which a single-server client target is registered.
pub const DEFAULT_SERVER_NAME: &str = "default";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Wire transport used to reach an MCP server.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    /// Streamable HTTP endpoint.
    StreamableHttp,
    /// HTTP endpoint configured under its legacy name; served over streamable HTTP.
    #[default]
    Sse,
    /// Local child process speaking MCP over stdin/stdout.
    Stdio,
}

impl TransportKind {
    pub fn is_http(self) -> bool {
        matches!(self, Self::StreamableHttp | Self::Sse)
    }
}

/// How to reach one named MCP server.
#[derive(Builder, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    #[builder(default)]
    pub transport: TransportKind,
    #[builder(into)]
    pub url: Option<String>,
    #[builder(into)]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub args: Vec<String>,
    /// Extra HTTP headers sent with every request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[builder(default)]
    pub headers: BTreeMap<String, String>,
    /// Credential sent as a bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub api_key: Option<String>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("transport", &self.transport)
            .field("url", &self.url)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .finish()
    }
}

impl ServerConfig {
    /// HTTP server using the given transport kind.
    pub fn http(url: impl Into<String>, transport: TransportKind) -> Self {
        Self::builder().url(url).transport(transport).build()
    }

    pub fn sse(url: impl Into<String>) -> Self {
        Self::http(url, TransportKind::Sse)
    }

    pub fn streamable_http(url: impl Into<String>) -> Self {
        Self::http(url, TransportKind::StreamableHttp)
    }

    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::builder()
            .transport(TransportKind::Stdio)
            .command(command)
            .args(args)
            .build()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check that the fields the transport needs are present and well formed.
    pub fn validate(&self, server_name: &str) -> Result<(), ToolkitError> {
        if server_name.trim().is_empty() {
            return Err(ToolkitError::Configuration("server name must not be empty".into()));
        }
        match self.transport {
            TransportKind::StreamableHttp | TransportKind::Sse => {
                let raw = self.url.as_deref().ok_or_else(|| {
                    ToolkitError::Configuration(format!(
                        "server '{server_name}' uses {} but has no url",
                        self.transport
                    ))
                })?;
                let parsed = url::Url::parse(raw).map_err(|e| {
                    ToolkitError::Configuration(format!("server '{server_name}' has invalid url '{raw}': {e}"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ToolkitError::Configuration(format!(
                        "server '{server_name}' url must be http(s), got '{}'",
                        parsed.scheme()
                    )));
                }
            }
            TransportKind::Stdio => {
                let command = self.command.as_deref().unwrap_or_default();
                if command.trim().is_empty() {
                    return Err(ToolkitError::Configuration(format!(
                        "server '{server_name}' uses stdio but has no command"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// What the client service should register on `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientTarget {
    /// One server, registered under [`DEFAULT_SERVER_NAME`].
    Single(ServerConfig),
    /// Several named servers.
    Multi(BTreeMap<String, ServerConfig>),
}

impl ClientTarget {
    pub fn single(url: impl Into<String>, transport: TransportKind) -> Self {
        Self::Single(ServerConfig::http(url, transport))
    }

    /// Named HTTP servers on the default transport.
    pub fn from_urls<I, K, V>(urls: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Multi(
            urls.into_iter()
                .map(|(name, url)| (name.into(), ServerConfig::sse(url)))
                .collect(),
        )
    }

    /// Flatten into `(name, config)` entries.
    pub fn into_entries(self) -> Vec<(String, ServerConfig)> {
        match self {
            Self::Single(config) => vec![(DEFAULT_SERVER_NAME.to_string(), config)],
            Self::Multi(servers) => servers.into_iter().collect(),
        }
    }
}

/// Toolkit operating mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolkitMode {
    #[default]
    Client,
    Server,
    ClientAndServer,
}

impl ToolkitMode {
    /// Modes that carry a client service and can register remote servers.
    pub fn has_client(self) -> bool {
        matches!(self, Self::Client | Self::ClientAndServer)
    }
}

/// Where the locally hosted server binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerBinding {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServerBinding {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.into(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Complete toolkit configuration, loadable from TOML and the environment.
///
/// ```toml
/// mode = "client_and_server"
/// connect_timeout_secs = 10
///
/// [server]
/// name = "local"
/// port = 8100
///
/// [servers.weather]
/// url = "http://localhost:8000/mcp"
/// transport = "streamable_http"
///
/// [servers.files]
/// transport = "stdio"
/// command = "npx"
/// args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub mode: ToolkitMode,
    pub servers: BTreeMap<String, ServerConfig>,
    pub server: ServerBinding,
    pub connect_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Credential applied to servers that do not carry their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            mode: ToolkitMode::default(),
            servers: BTreeMap::new(),
            server: ServerBinding::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

impl ToolkitConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ToolkitError> {
        toml::from_str(raw).map_err(|e| ToolkitError::Configuration(format!("invalid toolkit config: {e}")))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ToolkitError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            ToolkitError::Configuration(message) => {
                ToolkitError::Configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Load from environment variables (and `.env` when present).
    pub fn from_env() -> Result<Self, ToolkitError> {
        Self::default().with_env_overrides()
    }

    /// Load the TOML file when given, then layer environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ToolkitError> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    /// Apply `MCP_TOOLKIT_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self, ToolkitError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ToolkitError> {
        if let Some(mode) = lookup("MCP_TOOLKIT_MODE") {
            self.mode = mode.parse().map_err(|_| {
                ToolkitError::Configuration(format!("MCP_TOOLKIT_MODE has unknown mode '{mode}'"))
            })?;
        }
        if let Some(url) = lookup("MCP_TOOLKIT_SERVER_URL") {
            let transport = match lookup("MCP_TOOLKIT_TRANSPORT") {
                Some(raw) => raw.parse().map_err(|_| {
                    ToolkitError::Configuration(format!("MCP_TOOLKIT_TRANSPORT has unknown transport '{raw}'"))
                })?,
                None => TransportKind::default(),
            };
            self.servers
                .insert(DEFAULT_SERVER_NAME.to_string(), ServerConfig::http(url, transport));
        }
        if let Some(api_key) = lookup("MCP_TOOLKIT_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(host) = lookup("MCP_TOOLKIT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MCP_TOOLKIT_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ToolkitError::Configuration(format!("MCP_TOOLKIT_PORT is not a port: '{port}'"))
            })?;
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Validate every configured server.
    pub fn validate(&self) -> Result<(), ToolkitError> {
        for (name, server) in &self.servers {
            server.validate(name)?;
        }
        Ok(())
    }
}
