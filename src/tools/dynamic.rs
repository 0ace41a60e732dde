//! Runtime-discovered tools: remote MCP tools and tools hosted by the local server.

use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::tool::{ToolDescriptor, ToolExecutionContext, ToolOrigin};
use super::types::ToolParameters;
use crate::error::ToolkitError;

/// A tool discovered at runtime, not yet bound to a callback.
#[derive(Debug, Clone)]
pub struct DynamicTool {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
    pub origin: ToolOrigin,
}

/// Providers that can discover and execute tools at runtime.
#[async_trait]
pub trait DynamicToolProvider: Send + Sync {
    /// List available tools. Every call enumerates afresh.
    async fn list_tools(&self) -> Result<Vec<DynamicTool>, ToolkitError>;

    /// Execute a tool by the name returned from [`list_tools`](Self::list_tools).
    async fn execute_tool(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ToolkitError>;
}

/// Bind a discovered tool to its provider.
pub fn bind_dynamic_tool(provider: Arc<dyn DynamicToolProvider>, tool: DynamicTool) -> ToolDescriptor {
    let routed_name = tool.name.clone();
    ToolDescriptor::new(
        tool.name,
        tool.description,
        tool.parameters,
        tool.origin,
        move |args, ctx| {
            let provider = Arc::clone(&provider);
            let routed_name = routed_name.clone();
            async move { provider.execute_tool(&routed_name, &args, &ctx).await }
        },
    )
}

/// Enumerate a provider and bind every tool it reports.
pub async fn provider_descriptors(
    provider: Arc<dyn DynamicToolProvider>,
) -> Result<Vec<ToolDescriptor>, ToolkitError> {
    let tools = provider.list_tools().await?;
    Ok(tools
        .into_iter()
        .map(|tool| bind_dynamic_tool(Arc::clone(&provider), tool))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use std::sync::Mutex;

    struct MockProvider {
        last_call: Mutex<Option<String>>,
    }

    #[async_trait]
    impl DynamicToolProvider for MockProvider {
        async fn list_tools(&self) -> Result<Vec<DynamicTool>, ToolkitError> {
            Ok(vec![DynamicTool {
                name: "alpha__search".into(),
                description: "dynamic tool".into(),
                parameters: ToolParameters::empty(),
                origin: ToolOrigin::remote("alpha", "search"),
            }])
        }

        async fn execute_tool(
            &self,
            name: &str,
            _args: &ToolArguments,
            _ctx: &ToolExecutionContext,
        ) -> Result<serde_json::Value, ToolkitError> {
            let mut last_call = self.last_call.lock().expect("lock should succeed");
            *last_call = Some(name.to_string());
            Ok(serde_json::json!({ "ok": true }))
        }
    }

    #[tokio::test]
    async fn bound_descriptor_delegates_execute_to_provider() {
        let provider = Arc::new(MockProvider {
            last_call: Mutex::new(None),
        });
        let provider_dyn: Arc<dyn DynamicToolProvider> = provider.clone();

        let descriptors = provider_descriptors(provider_dyn)
            .await
            .expect("listing should succeed");
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].origin(), &ToolOrigin::remote("alpha", "search"));

        let result = descriptors[0]
            .execute(
                &ToolArguments::new(serde_json::json!({})),
                &ToolExecutionContext::default(),
            )
            .await
            .expect("execute should succeed");

        assert_eq!(result["ok"], true);
        let last_call = provider
            .last_call
            .lock()
            .expect("lock should succeed")
            .clone();
        assert_eq!(last_call.as_deref(), Some("alpha__search"));
    }
}
