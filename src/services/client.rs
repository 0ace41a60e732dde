//! Client service: a registry of named MCP servers and the operations that
//! discover and invoke their capabilities.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::config::{ClientTarget, ServerConfig, DEFAULT_SERVER_NAME};
use crate::error::{Result, ServerFailure, ToolkitError};
use crate::mcp::schema::{
    MCPPromptResult, MCPPromptSchema, MCPResourceContent, MCPResourceSchema, MCPToolSchema,
};
use crate::mcp::session::{MCPConnector, MCPSession, RmcpConnector};
use crate::tools::arguments::ToolArguments;
use crate::tools::dynamic::{DynamicTool, DynamicToolProvider};
use crate::tools::tool::{ToolDescriptor, ToolExecutionContext, ToolOrigin};
use crate::tools::types::ToolParameters;
use crate::types::ModelMessage;
use crate::util::naming::namespaced;
use crate::util::timeout::with_timeout;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type SharedSession = Arc<dyn MCPSession>;

/// Lifecycle of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created but never connected.
    Registered,
    Connected,
    /// The last connection attempt failed.
    Failed { reason: String },
    Disconnected,
}

struct ConnectionEntry {
    config: ServerConfig,
    state: ConnectionState,
    session: Option<SharedSession>,
}

impl ConnectionEntry {
    fn registered(config: ServerConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Registered,
            session: None,
        }
    }
}

/// A capability tagged with the server that offers it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerItem<T> {
    pub server: String,
    #[serde(flatten)]
    pub item: T,
}

/// Result of a listing across servers: tagged items plus per-server failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<ServerItem<T>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ServerFailure>,
}

impl<T> Listing<T> {
    fn single(server: &str, items: Vec<T>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| ServerItem {
                    server: server.to_string(),
                    item,
                })
                .collect(),
            failures: Vec::new(),
        }
    }

    /// Servers that offer an item matching `predicate`, in listing order.
    pub fn servers_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<String> {
        let mut servers: Vec<String> = self
            .items
            .iter()
            .filter(|entry| predicate(&entry.item))
            .map(|entry| entry.server.clone())
            .collect();
        servers.dedup();
        servers
    }
}

/// Named connections to MCP servers.
///
/// Registry mutation happens under a short synchronous lock; every network
/// exchange runs against a cloned session handle after the lock is released.
/// Sessions are shared, so a slow request never queues others to the same
/// server.
pub struct MCPClientService {
    registry: RwLock<BTreeMap<String, ConnectionEntry>>,
    connector: Arc<dyn MCPConnector>,
    default_api_key: Option<String>,
    request_timeout: Duration,
    routes: RwLock<HashMap<String, (String, String)>>,
}

impl Default for MCPClientService {
    fn default() -> Self {
        Self::new()
    }
}

impl MCPClientService {
    pub fn new() -> Self {
        Self::with_connector(Arc::new(RmcpConnector::default()))
    }

    /// Use a custom connector, e.g. one with a different handshake timeout.
    pub fn with_connector(connector: Arc<dyn MCPConnector>) -> Self {
        Self {
            registry: RwLock::new(BTreeMap::new()),
            connector,
            default_api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Credential applied to created servers that carry none of their own.
    pub fn with_default_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.default_api_key = Some(api_key.into());
        self
    }

    /// Deadline for each request on an established session.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Register servers without opening any transport.
    ///
    /// All entries are validated and checked for conflicts before any is
    /// inserted. Re-creating an identical entry is a no-op.
    pub fn create(&self, target: ClientTarget) -> Result<()> {
        let single = matches!(target, ClientTarget::Single(_));
        let mut entries = target.into_entries();
        let mut seen = HashSet::new();
        for (name, config) in &mut entries {
            *name = name.trim().to_string();
            if !seen.insert(name.clone()) {
                return Err(ToolkitError::InvalidArgument(format!(
                    "server name '{name}' appears more than once"
                )));
            }
            if config.api_key.is_none() {
                config.api_key = self.default_api_key.clone();
            }
            config.validate(name)?;
        }

        let mut registry = write(&self.registry)?;
        if single {
            if let Some(other) = registry.keys().find(|name| *name != DEFAULT_SERVER_NAME) {
                return Err(ToolkitError::Configuration(format!(
                    "cannot register a single default server while named server '{other}' exists"
                )));
            }
        }
        for (name, config) in &entries {
            if let Some(existing) = registry.get(name) {
                if existing.config != *config {
                    return Err(ToolkitError::Configuration(format!(
                        "server '{name}' is already registered with different settings"
                    )));
                }
            }
        }
        for (name, config) in entries {
            if registry.contains_key(&name) {
                continue;
            }
            tracing::debug!(server = %name, transport = %config.transport, "registered MCP server");
            registry.insert(name, ConnectionEntry::registered(config));
        }
        Ok(())
    }

    /// Open connections.
    ///
    /// With a name, connects that server and returns its error directly.
    /// Without, connects every registered server that is not connected yet,
    /// concurrently, and reports all failures together as `AggregateConnect`.
    /// The registry is only touched once every attempt has resolved.
    pub async fn connect(&self, server: Option<&str>) -> Result<()> {
        let targets = self.connect_targets(server)?;
        if targets.is_empty() {
            return Ok(());
        }

        let attempts = targets.into_iter().map(|(name, config)| {
            let connector = Arc::clone(&self.connector);
            async move {
                let outcome = connector.connect(&name, &config).await;
                (name, config, outcome)
            }
        });
        let outcomes = join_all(attempts).await;

        let mut failures = Vec::new();
        let mut first_error = None;
        let mut surplus = Vec::new();
        {
            let mut registry = write(&self.registry)?;
            for (name, config, outcome) in outcomes {
                let Some(entry) = registry.get_mut(&name).filter(|entry| entry.config == config) else {
                    // Removed or re-created while connecting.
                    if let Ok(session) = outcome {
                        surplus.push((name, session));
                    }
                    continue;
                };
                match outcome {
                    Ok(session) if entry.session.is_none() => {
                        tracing::info!(server = %name, "connected MCP server");
                        entry.session = Some(session);
                        entry.state = ConnectionState::Connected;
                    }
                    Ok(session) => surplus.push((name, session)),
                    Err(err) => {
                        tracing::warn!(server = %name, error = %err, "failed to connect MCP server");
                        entry.state = ConnectionState::Failed {
                            reason: err.to_string(),
                        };
                        failures.push(ServerFailure::new(&name, err.to_string()));
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
        for (name, session) in surplus {
            if let Err(err) = session.close().await {
                tracing::warn!(server = %name, error = %err, "error while closing surplus MCP session");
            }
        }

        match (server, first_error) {
            (_, None) => Ok(()),
            (Some(_), Some(err)) => Err(err),
            (None, Some(_)) => Err(ToolkitError::AggregateConnect { failures }),
        }
    }

    fn connect_targets(&self, server: Option<&str>) -> Result<Vec<(String, ServerConfig)>> {
        let registry = read(&self.registry)?;
        match server {
            Some(name) => {
                let entry = registry.get(name).ok_or_else(|| unknown_server(name))?;
                if entry.session.is_some() {
                    return Ok(Vec::new());
                }
                Ok(vec![(name.to_string(), entry.config.clone())])
            }
            None => Ok(registry
                .iter()
                .filter(|(_, entry)| entry.session.is_none())
                .map(|(name, entry)| (name.clone(), entry.config.clone()))
                .collect()),
        }
    }

    /// Close sessions; entries stay registered as `Disconnected`.
    pub async fn disconnect(&self, server: Option<&str>) -> Result<()> {
        let sessions = {
            let mut registry = write(&self.registry)?;
            let mut taken = Vec::new();
            match server {
                Some(name) => {
                    let entry = registry.get_mut(name).ok_or_else(|| unknown_server(name))?;
                    taken.extend(take_session(name, entry));
                }
                None => {
                    for (name, entry) in registry.iter_mut() {
                        taken.extend(take_session(name, entry));
                    }
                }
            }
            taken
        };
        close_all(sessions).await;
        Ok(())
    }

    /// Drop an entry entirely, closing its session if open.
    pub async fn remove(&self, server: &str) -> Result<()> {
        let entry = write(&self.registry)?
            .remove(server)
            .ok_or_else(|| unknown_server(server))?;
        tracing::debug!(server, "removed MCP server");
        close_all(entry.session.map(|session| (server.to_string(), session))).await;
        Ok(())
    }

    /// Registered server names in order.
    pub fn server_names(&self) -> Vec<String> {
        read(&self.registry)
            .map(|registry| registry.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_state(&self, server: &str) -> Option<ConnectionState> {
        read(&self.registry)
            .ok()
            .and_then(|registry| registry.get(server).map(|entry| entry.state.clone()))
    }

    pub fn is_connected(&self, server: &str) -> bool {
        self.connection_state(server) == Some(ConnectionState::Connected)
    }

    fn session(&self, server: &str) -> Result<SharedSession> {
        read(&self.registry)?
            .get(server)
            .and_then(|entry| entry.session.clone())
            .ok_or_else(|| ToolkitError::not_connected(server))
    }

    fn connected_sessions(&self) -> Result<Vec<(String, SharedSession)>> {
        Ok(read(&self.registry)?
            .iter()
            .filter_map(|(name, entry)| entry.session.clone().map(|session| (name.clone(), session)))
            .collect())
    }

    /// Invoke `tool` on `server`.
    pub async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let session = self.session(server)?;
        tracing::debug!(server, tool, "calling remote tool");
        with_timeout(self.request_timeout, session.call_tool(tool, arguments)).await
    }

    pub async fn list_tools(&self, server: Option<&str>) -> Result<Listing<MCPToolSchema>> {
        self.list_with(server, |session| session.list_tools()).await
    }

    pub async fn list_resources(&self, server: Option<&str>) -> Result<Listing<MCPResourceSchema>> {
        self.list_with(server, |session| session.list_resources()).await
    }

    pub async fn list_prompts(&self, server: Option<&str>) -> Result<Listing<MCPPromptSchema>> {
        self.list_with(server, |session| session.list_prompts()).await
    }

    /// List one server (errors propagate) or every connected server
    /// (failures are collected in the listing).
    async fn list_with<T, F>(&self, server: Option<&str>, list: F) -> Result<Listing<T>>
    where
        T: Send,
        F: for<'a> Fn(&'a dyn MCPSession) -> futures::future::BoxFuture<'a, Result<Vec<T>>> + Sync,
    {
        let timeout = self.request_timeout;
        if let Some(name) = server {
            let session = self.session(name)?;
            let items = with_timeout(timeout, list(session.as_ref())).await?;
            return Ok(Listing::single(name, items));
        }

        let sessions = self.connected_sessions()?;
        let list = &list;
        let outcomes = join_all(sessions.into_iter().map(|(name, session)| async move {
            let outcome = with_timeout(timeout, list(session.as_ref())).await;
            (name, outcome)
        }))
        .await;

        let mut listing = Listing {
            items: Vec::new(),
            failures: Vec::new(),
        };
        for (name, outcome) in outcomes {
            match outcome {
                Ok(items) => listing.items.extend(
                    items.into_iter().map(|item| ServerItem {
                        server: name.clone(),
                        item,
                    }),
                ),
                Err(err) => {
                    tracing::warn!(server = %name, error = %err, "listing failed");
                    listing.failures.push(ServerFailure::new(&name, err.to_string()));
                }
            }
        }
        Ok(listing)
    }

    pub async fn read_resource(&self, server: &str, uri: &str) -> Result<Vec<MCPResourceContent>> {
        let session = self.session(server)?;
        with_timeout(self.request_timeout, session.read_resource(uri)).await
    }

    pub async fn get_prompt(
        &self,
        server: &str,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<MCPPromptResult> {
        let session = self.session(server)?;
        with_timeout(self.request_timeout, session.get_prompt(name, arguments)).await
    }

    /// Every remote tool of every connected server as `<server>__<tool>`.
    ///
    /// Names that sanitize to one already taken get a numeric suffix.
    async fn remote_tools(&self) -> Result<Vec<DynamicTool>> {
        let listing = self.list_tools(None).await?;
        if !listing.failures.is_empty() {
            return Err(ToolkitError::AggregateList {
                failures: listing.failures,
            });
        }

        let mut routes = HashMap::new();
        let mut tools = Vec::with_capacity(listing.items.len());
        for ServerItem { server, item } in listing.items {
            let base = namespaced(&server, &item.name);
            let mut exposed = base.clone();
            let mut suffix = 2;
            while routes.contains_key(&exposed) {
                exposed = format!("{base}_{suffix}");
                suffix += 1;
            }
            if exposed != base {
                tracing::warn!(server = %server, tool = %item.name, exposed = %exposed, "remote tool name collides after sanitizing; renamed");
            }
            routes.insert(exposed.clone(), (server.clone(), item.name.clone()));
            tools.push(DynamicTool {
                name: exposed,
                description: item.description.unwrap_or_default(),
                parameters: ToolParameters::from_schema(item.input_schema),
                origin: ToolOrigin::remote(server, item.name),
            });
        }
        tools.sort_by(|left, right| left.name.cmp(&right.name));
        *write(&self.routes)? = routes;
        Ok(tools)
    }

    /// One descriptor per remote tool; calls route to the origin server.
    pub async fn get_langchain_tools(self: &Arc<Self>) -> Result<Vec<ToolDescriptor>> {
        let tools = self.remote_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| remote_descriptor(Arc::clone(self), tool))
            .collect())
    }

    /// Resolve a prompt and render it as chat messages.
    ///
    /// Without a server the prompt must be offered by exactly one connected
    /// server.
    pub async fn get_langchain_prompt(
        &self,
        name: &str,
        variables: serde_json::Map<String, serde_json::Value>,
        server: Option<&str>,
    ) -> Result<Vec<ModelMessage>> {
        let server = match server {
            Some(server) => server.to_string(),
            None => self.resolve_prompt_server(name).await?,
        };
        let prompt = self.get_prompt(&server, name, variables).await?;
        Ok(prompt.messages.iter().map(ModelMessage::from).collect())
    }

    async fn resolve_prompt_server(&self, name: &str) -> Result<String> {
        let listing = self.list_prompts(None).await?;
        let mut servers = listing.servers_where(|prompt| prompt.name == name);
        match servers.len() {
            0 => {
                if !listing.failures.is_empty() {
                    tracing::warn!(prompt = name, failed = listing.failures.len(), "prompt lookup skipped servers that failed to list");
                }
                Err(ToolkitError::PromptNotFound(name.to_string()))
            }
            1 => Ok(servers.remove(0)),
            _ => Err(ToolkitError::AmbiguousPrompt {
                prompt: name.to_string(),
                servers,
            }),
        }
    }
}

fn remote_descriptor(service: Arc<MCPClientService>, tool: DynamicTool) -> ToolDescriptor {
    let (server, upstream) = match &tool.origin {
        ToolOrigin::Remote { server, tool } => (server.clone(), tool.clone()),
        _ => (String::new(), tool.name.clone()),
    };
    ToolDescriptor::new(
        tool.name,
        tool.description,
        tool.parameters,
        tool.origin,
        move |args, _ctx| {
            let service = Arc::clone(&service);
            let server = server.clone();
            let upstream = upstream.clone();
            async move { service.call_tool(&server, &upstream, args.into_raw()).await }
        },
    )
}

#[async_trait]
impl DynamicToolProvider for MCPClientService {
    async fn list_tools(&self) -> Result<Vec<DynamicTool>> {
        self.remote_tools().await
    }

    async fn execute_tool(
        &self,
        name: &str,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value> {
        let route = read(&self.routes)?.get(name).cloned();
        let (server, tool) = route.ok_or_else(|| {
            ToolkitError::InvalidArgument(format!("unknown remote tool '{name}'"))
        })?;
        self.call_tool(&server, &tool, args.raw().clone()).await
    }
}

fn take_session(name: &str, entry: &mut ConnectionEntry) -> Option<(String, SharedSession)> {
    let session = entry.session.take()?;
    entry.state = ConnectionState::Disconnected;
    Some((name.to_string(), session))
}

async fn close_all(sessions: impl IntoIterator<Item = (String, SharedSession)>) {
    for (name, session) in sessions {
        if let Err(err) = session.close().await {
            tracing::warn!(server = %name, error = %err, "error while closing MCP session");
        } else {
            tracing::info!(server = %name, "disconnected MCP server");
        }
    }
}

fn unknown_server(name: &str) -> ToolkitError {
    ToolkitError::Configuration(format!("server '{name}' is not registered"))
}

fn read<T>(lock: &RwLock<T>) -> Result<std::sync::RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ToolkitError::InvalidState("client registry lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> Result<std::sync::RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ToolkitError::InvalidState("client registry lock poisoned".into()))
}
