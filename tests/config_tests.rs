//! Tests for toolkit configuration loading.

use std::io::Write;
use std::sync::{Mutex, OnceLock};

use mcp_toolkit::config::{ServerConfig, ToolkitConfig, ToolkitMode, TransportKind, DEFAULT_SERVER_NAME};
use mcp_toolkit::error::ToolkitError;
use mcp_toolkit::toolkit::Toolkit;
use tempfile::NamedTempFile;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const TOOLKIT_ENV_VARS: [&str; 6] = [
    "MCP_TOOLKIT_MODE",
    "MCP_TOOLKIT_SERVER_URL",
    "MCP_TOOLKIT_TRANSPORT",
    "MCP_TOOLKIT_API_KEY",
    "MCP_TOOLKIT_HOST",
    "MCP_TOOLKIT_PORT",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn toml_file_registers_every_named_server() {
    let file = write_config(
        r#"
        mode = "client_and_server"
        tool_timeout_secs = 5

        [server]
        name = "local"
        host = "127.0.0.1"
        port = 0

        [servers.weather]
        url = "http://localhost:8000/mcp"
        transport = "streamable_http"

        [servers.files]
        transport = "stdio"
        command = "npx"
        args = ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
        "#,
    );

    let config = ToolkitConfig::from_toml_file(file.path()).expect("config should load");
    assert_eq!(config.mode, ToolkitMode::ClientAndServer);
    assert_eq!(config.server.name, "local");
    assert_eq!(config.servers["files"].transport, TransportKind::Stdio);

    let toolkit = Toolkit::from_config(config).expect("toolkit should build");
    let client = toolkit.get_client_service().expect("client mode");
    assert_eq!(client.server_names(), vec!["files".to_string(), "weather".to_string()]);
    assert!(toolkit.get_server_service().is_ok());
}

#[test]
fn invalid_server_in_file_is_a_configuration_error() {
    let file = write_config(
        r#"
        [servers.broken]
        transport = "sse"
        "#,
    );
    let config = ToolkitConfig::from_toml_file(file.path()).expect("file parses");
    let err = Toolkit::from_config(config).err().expect("server without url");
    assert!(matches!(err, ToolkitError::Configuration(msg) if msg.contains("broken")));
}

#[test]
fn malformed_file_names_the_path() {
    let file = write_config("mode = [");
    let err = ToolkitConfig::from_toml_file(file.path()).expect_err("invalid toml");
    let path = file.path().display().to_string();
    assert!(matches!(err, ToolkitError::Configuration(msg) if msg.contains(&path)));
}

#[test]
fn environment_overrides_file_values() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&TOOLKIT_ENV_VARS);
    for key in TOOLKIT_ENV_VARS {
        std::env::remove_var(key);
    }

    let file = write_config(
        r#"
        mode = "client"

        [server]
        port = 9000
        "#,
    );
    std::env::set_var("MCP_TOOLKIT_MODE", "client_and_server");
    std::env::set_var("MCP_TOOLKIT_SERVER_URL", "http://localhost:8123/mcp");
    std::env::set_var("MCP_TOOLKIT_TRANSPORT", "streamable_http");
    std::env::set_var("MCP_TOOLKIT_API_KEY", "sk-env");
    std::env::set_var("MCP_TOOLKIT_PORT", "8111");

    let config = ToolkitConfig::load(Some(file.path())).expect("config should load");
    assert_eq!(config.mode, ToolkitMode::ClientAndServer);
    assert_eq!(config.server.port, 8111);
    assert_eq!(config.api_key.as_deref(), Some("sk-env"));
    assert_eq!(
        config.servers[DEFAULT_SERVER_NAME],
        ServerConfig::streamable_http("http://localhost:8123/mcp")
    );
}

#[test]
fn unknown_mode_in_environment_is_rejected() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&TOOLKIT_ENV_VARS);
    for key in TOOLKIT_ENV_VARS {
        std::env::remove_var(key);
    }
    std::env::set_var("MCP_TOOLKIT_MODE", "proxy");

    let err = ToolkitConfig::from_env().expect_err("proxy is not a mode");
    assert!(matches!(err, ToolkitError::Configuration(msg) if msg.contains("proxy")));
}
