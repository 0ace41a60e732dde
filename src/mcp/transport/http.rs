use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, ServiceExt};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;

use super::{MCPRunningService, MCPTransport};
use crate::config::ServerConfig;
use crate::error::ToolkitError;

/// Streamable HTTP transport for remote MCP servers.
///
/// Extra headers and the bearer credential are installed as reqwest default
/// headers, so they ride along on every POST/GET the SDK issues.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, ToolkitError> {
        Self::with_headers(url, &BTreeMap::new(), None)
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, ToolkitError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| ToolkitError::Configuration("HTTP transport requires a url".into()))?;
        Self::with_headers(url, &config.headers, config.api_key.as_deref())
    }

    pub fn with_headers(
        url: impl Into<String>,
        headers: &BTreeMap<String, String>,
        api_key: Option<&str>,
    ) -> Result<Self, ToolkitError> {
        let client = reqwest::Client::builder()
            .default_headers(header_map(headers, api_key)?)
            .build()
            .map_err(|e| ToolkitError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

fn header_map(
    headers: &BTreeMap<String, String>,
    api_key: Option<&str>,
) -> Result<HeaderMap, ToolkitError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ToolkitError::Configuration(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ToolkitError::Configuration(format!("invalid value for header '{name}': {e}")))?;
        map.insert(name, value);
    }
    if let Some(api_key) = api_key {
        let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ToolkitError::Configuration("api key is not a valid header value".into()))?;
        value.set_sensitive(true);
        map.insert(AUTHORIZATION, value);
    }
    Ok(map)
}

#[async_trait]
impl MCPTransport for HttpTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let transport = StreamableHttpClientTransport::with_client(
            self.client.clone(),
            StreamableHttpClientTransportConfig::with_uri(self.url.clone()),
        );
        client_info.into_dyn().serve(transport).await
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_map_adds_bearer_credential() {
        let headers = BTreeMap::from([("x-scope".to_string(), "qa".to_string())]);
        let map = header_map(&headers, Some("sk-1")).expect("headers should build");

        assert_eq!(map.get("x-scope").and_then(|v| v.to_str().ok()), Some("qa"));
        assert_eq!(
            map.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer sk-1")
        );
    }

    #[test]
    fn invalid_header_name_is_a_configuration_error() {
        let headers = BTreeMap::from([("bad header".to_string(), "v".to_string())]);
        let err = header_map(&headers, None).unwrap_err();
        assert!(matches!(err, ToolkitError::Configuration(msg) if msg.contains("bad header")));
    }
}
