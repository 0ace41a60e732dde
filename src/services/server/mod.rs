//! Server service: hosts one local MCP server whose capability set can grow
//! while it runs.

pub mod capability;
mod handler;

pub use capability::{
    CapabilitySet, HostedPrompt, HostedResource, HostedTool, NativeToolFn, ToolBody,
    RESOURCE_URI_PREFIX,
};

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerBinding;
use crate::error::{Result, ToolkitError};
use crate::tools::arguments::ToolArguments;
use crate::tools::dynamic::{DynamicTool, DynamicToolProvider};
use crate::tools::tool::{ToolExecutionContext, ToolOrigin};

use handler::CapabilityHandler;

/// Path the MCP endpoint is mounted at.
pub const MCP_PATH: &str = "/mcp";
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Observable lifecycle of the local server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct RunningServer {
    name: String,
    addr: SocketAddr,
    url: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

enum Instance {
    Stopped,
    Starting,
    Running(RunningServer),
    Stopping,
}

impl Instance {
    fn state(&self) -> ServerState {
        match self {
            Self::Stopped => ServerState::Stopped,
            Self::Starting => ServerState::Starting,
            Self::Running(_) => ServerState::Running,
            Self::Stopping => ServerState::Stopping,
        }
    }
}

/// Snapshot of a running server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub url: String,
    pub addr: SocketAddr,
    pub started_at: DateTime<Utc>,
}

/// Puts the instance back to `Stopped` unless the start completed.
struct StartGuard<'a> {
    instance: &'a Mutex<Instance>,
    armed: bool,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut instance) = self.instance.lock() {
                *instance = Instance::Stopped;
            }
        }
    }
}

/// Completes a stop even when the caller stops waiting: the serving task is
/// aborted and the instance returns to `Stopped`.
struct StopGuard<'a> {
    instance: &'a Mutex<Instance>,
    task: JoinHandle<()>,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.task.abort();
        if let Ok(mut instance) = self.instance.lock() {
            *instance = Instance::Stopped;
        }
    }
}

/// Local MCP server with a runtime-extensible capability set.
pub struct MCPServerService {
    instance: Mutex<Instance>,
    capabilities: Arc<CapabilitySet>,
    tool_timeout: Duration,
}

impl Default for MCPServerService {
    fn default() -> Self {
        Self::new()
    }
}

impl MCPServerService {
    pub fn new() -> Self {
        Self {
            instance: Mutex::new(Instance::Stopped),
            capabilities: Arc::new(CapabilitySet::default()),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Deadline for each hosted tool call.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    fn instance(&self) -> Result<MutexGuard<'_, Instance>> {
        self.instance
            .lock()
            .map_err(|_| ToolkitError::InvalidState("server state lock poisoned".into()))
    }

    /// Bind `host:port` (port 0 picks a free one) and serve MCP at `/mcp`.
    ///
    /// Only one caller can move the instance out of `Stopped`; everyone else
    /// gets `AlreadyRunning`.
    pub async fn start(&self, name: &str, host: &str, port: u16) -> Result<String> {
        {
            let mut instance = self.instance()?;
            let refusal = match &*instance {
                Instance::Stopped => None,
                Instance::Running(running) => Some(ToolkitError::AlreadyRunning {
                    url: Some(running.url.clone()),
                }),
                Instance::Starting => Some(ToolkitError::AlreadyRunning { url: None }),
                Instance::Stopping => Some(ToolkitError::InvalidState("server is stopping".into())),
            };
            if let Some(err) = refusal {
                return Err(err);
            }
            *instance = Instance::Starting;
        }
        let mut guard = StartGuard {
            instance: &self.instance,
            armed: true,
        };

        let listener = tokio::net::TcpListener::bind((host, port)).await.map_err(|err| {
            ToolkitError::Transport(format!("failed to bind {host}:{port}: {err}"))
        })?;
        let addr = listener.local_addr()?;
        let url = format!("http://{host}:{}{MCP_PATH}", addr.port());

        let handler = CapabilityHandler::new(
            name.to_string(),
            Arc::clone(&self.capabilities),
            self.tool_timeout,
        );
        let service = StreamableHttpService::new(
            move || Ok(handler.clone()),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig::default(),
        );
        let router = axum::Router::new().nest_service(MCP_PATH, service);

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let server_name = name.to_string();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await;
            if let Err(err) = served {
                tracing::warn!(server = %server_name, error = %err, "MCP server exited with error");
            }
        });

        let mut instance = self.instance()?;
        *instance = Instance::Running(RunningServer {
            name: name.to_string(),
            addr,
            url: url.clone(),
            cancel,
            task,
            started_at: Utc::now(),
        });
        guard.armed = false;
        tracing::info!(server = name, url = %url, "MCP server started");
        Ok(url)
    }

    /// Start with a configured binding.
    pub async fn start_with(&self, binding: &ServerBinding) -> Result<String> {
        self.start(&binding.name, &binding.host, binding.port).await
    }

    /// Stop serving and release the address. No-op when already stopped.
    pub async fn stop(&self) -> Result<()> {
        let running = {
            let mut instance = self.instance()?;
            match std::mem::replace(&mut *instance, Instance::Stopping) {
                Instance::Running(running) => running,
                Instance::Stopped => {
                    *instance = Instance::Stopped;
                    return Ok(());
                }
                other => {
                    let state = other.state();
                    *instance = other;
                    return Err(ToolkitError::InvalidState(format!(
                        "cannot stop a server that is {state}"
                    )));
                }
            }
        };

        running.cancel.cancel();
        let mut guard = StopGuard {
            instance: &self.instance,
            task: running.task,
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut guard.task).await.is_err() {
            tracing::warn!(server = %running.name, "MCP server did not drain in time; aborting");
            guard.task.abort();
            // The aborted task reports a cancellation error.
            let _ = (&mut guard.task).await;
        }
        drop(guard);

        tracing::info!(server = %running.name, addr = %running.addr, "MCP server stopped");
        Ok(())
    }

    /// Endpoint URL while running.
    pub fn get_url(&self) -> Result<String> {
        match &*self.instance()? {
            Instance::Running(running) => Ok(running.url.clone()),
            _ => Err(ToolkitError::NotRunning),
        }
    }

    pub fn state(&self) -> ServerState {
        self.instance()
            .map(|instance| instance.state())
            .unwrap_or(ServerState::Stopped)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    pub fn status(&self) -> Option<ServerStatus> {
        match &*self.instance().ok()? {
            Instance::Running(running) => Some(ServerStatus {
                name: running.name.clone(),
                url: running.url.clone(),
                addr: running.addr,
                started_at: running.started_at,
            }),
            _ => None,
        }
    }

    /// Register a tool. Connected clients see it on their next listing.
    pub fn add_tool(&self, name: &str, description: &str, body: ToolBody) -> Result<()> {
        self.capabilities
            .add_tool(HostedTool::new(name, description, body)?)
    }

    /// Register a resource at `resource://<name>`. Strings are served as
    /// `text/plain`, everything else as JSON.
    pub fn add_resource(
        &self,
        name: &str,
        content: serde_json::Value,
        description: Option<String>,
    ) -> Result<()> {
        self.capabilities
            .add_resource(HostedResource::new(name, content, description)?)
    }

    /// Register a prompt template; `{placeholders}` become required arguments.
    pub fn add_prompt(&self, name: &str, template: &str, description: Option<String>) -> Result<()> {
        self.capabilities
            .add_prompt(HostedPrompt::new(name, template, description)?)
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Run a hosted tool in-process, the same way a remote caller would.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let tool = self.capabilities.tool(name).ok_or_else(|| {
            ToolkitError::InvalidArgument(format!("no hosted tool named '{name}'"))
        })?;
        tool.execute(arguments, self.tool_timeout).await
    }
}

impl Drop for MCPServerService {
    fn drop(&mut self) {
        if let Ok(Instance::Running(running)) = self.instance.get_mut() {
            running.cancel.cancel();
        }
    }
}

#[async_trait]
impl DynamicToolProvider for MCPServerService {
    async fn list_tools(&self) -> Result<Vec<DynamicTool>> {
        Ok(self
            .capabilities
            .tools()
            .into_iter()
            .map(|tool| DynamicTool {
                origin: ToolOrigin::hosted(&tool.name),
                name: tool.name,
                description: tool.description,
                parameters: tool.parameters,
            })
            .collect())
    }

    async fn execute_tool(
        &self,
        name: &str,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value> {
        self.call_tool(name, args.raw().clone()).await
    }
}
