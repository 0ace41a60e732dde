//! Capabilities hosted by the local server: tools, resources and prompts.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{CapabilityKind, Result, ToolkitError};
use crate::sandbox::Script;
use crate::tools::arguments::ToolArguments;
use crate::tools::types::ToolParameters;
use crate::util::naming::{is_valid_capability_name, sanitize_tool_name};
use crate::util::timeout::with_timeout;

/// URI scheme under which resources are published.
pub const RESOURCE_URI_PREFIX: &str = "resource://";

/// Native tool callback.
pub type NativeToolFn = Arc<dyn Fn(ToolArguments) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Implementation supplied to `add_tool`.
#[derive(Clone)]
pub enum ToolBody {
    /// Async Rust callback with an explicit input schema.
    Native {
        parameters: ToolParameters,
        handler: NativeToolFn,
    },
    /// Expression source run by the sandbox evaluator.
    Script(String),
}

impl ToolBody {
    pub fn native<F, Fut>(parameters: ToolParameters, handler: F) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        Self::Native {
            parameters,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn script(source: impl Into<String>) -> Self {
        Self::Script(source.into())
    }
}

impl std::fmt::Debug for ToolBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native { parameters, .. } => f
                .debug_struct("Native")
                .field("parameters", parameters)
                .finish_non_exhaustive(),
            Self::Script(source) => f.debug_tuple("Script").field(source).finish(),
        }
    }
}

#[derive(Clone)]
enum Implementation {
    Native(NativeToolFn),
    Script(Arc<Script>),
}

/// A registered tool, ready to execute.
#[derive(Clone)]
pub struct HostedTool {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
    implementation: Implementation,
}

impl HostedTool {
    /// Validate the name and compile script bodies.
    pub fn new(name: &str, description: &str, body: ToolBody) -> Result<Self> {
        check_name(CapabilityKind::Tool, name)?;
        let (parameters, implementation) = match body {
            ToolBody::Native {
                parameters,
                handler,
            } => (parameters, Implementation::Native(handler)),
            ToolBody::Script(source) => {
                let script = Script::compile(&source)?;
                let required = script.required_variables();
                let parameters = script
                    .variables()
                    .into_iter()
                    .fold(ToolParameters::object(), |builder, variable| {
                        let is_required = required.contains(&variable);
                        builder.any(variable, "", is_required)
                    })
                    .build();
                (parameters, Implementation::Script(Arc::new(script)))
            }
        };
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            implementation,
        })
    }

    /// Run the tool. Panics and elapsed deadlines come back as errors.
    pub async fn execute(&self, arguments: Value, timeout: Duration) -> Result<Value> {
        match &self.implementation {
            Implementation::Script(script) => {
                let args = match arguments {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    other => {
                        return Err(ToolkitError::InvalidArgument(format!(
                            "{}: arguments must be an object, got {other}",
                            self.name
                        )))
                    }
                };
                Ok(script.evaluate(&args)?)
            }
            Implementation::Native(handler) => {
                let task = tokio::spawn(handler(ToolArguments::new(arguments)));
                let abort = task.abort_handle();
                let joined = with_timeout(timeout, async {
                    task.await.map_err(|err| ToolkitError::ToolExecution {
                        tool_name: self.name.clone(),
                        message: if err.is_panic() {
                            "tool panicked".into()
                        } else {
                            err.to_string()
                        },
                    })
                })
                .await;
                if joined.is_err() {
                    abort.abort();
                }
                joined?
            }
        }
    }
}

impl std::fmt::Debug for HostedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A static resource published at `resource://<name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedResource {
    pub name: String,
    pub uri: String,
    pub description: Option<String>,
    pub content: Value,
}

impl HostedResource {
    pub fn new(name: &str, content: Value, description: Option<String>) -> Result<Self> {
        check_name(CapabilityKind::Resource, name)?;
        Ok(Self {
            name: name.to_string(),
            uri: format!("{RESOURCE_URI_PREFIX}{name}"),
            description,
            content,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        match self.content {
            Value::String(_) => "text/plain",
            _ => "application/json",
        }
    }

    /// Payload as sent over the wire.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex must compile")
});

/// A prompt template with `{variable}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedPrompt {
    pub name: String,
    pub description: Option<String>,
    pub template: String,
    /// Placeholder names in first-appearance order.
    pub variables: Vec<String>,
}

impl HostedPrompt {
    pub fn new(name: &str, template: &str, description: Option<String>) -> Result<Self> {
        check_name(CapabilityKind::Prompt, name)?;
        let mut variables: Vec<String> = Vec::new();
        for captures in PLACEHOLDER_RE.captures_iter(template) {
            let variable = &captures[1];
            if !variables.iter().any(|known| known == variable) {
                variables.push(variable.to_string());
            }
        }
        Ok(Self {
            name: name.to_string(),
            description,
            template: template.to_string(),
            variables,
        })
    }

    /// Substitute every placeholder; all variables are required.
    pub fn render(&self, arguments: &Map<String, Value>) -> Result<String> {
        if let Some(missing) = self.variables.iter().find(|v| !arguments.contains_key(*v)) {
            return Err(ToolkitError::InvalidArgument(format!(
                "prompt '{}' requires argument '{missing}'",
                self.name
            )));
        }
        let rendered = PLACEHOLDER_RE.replace_all(&self.template, |captures: &regex::Captures<'_>| {
            match &arguments[&captures[1]] {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            }
        });
        Ok(rendered.into_owned())
    }
}

fn check_name(kind: CapabilityKind, name: &str) -> Result<()> {
    if is_valid_capability_name(name) {
        Ok(())
    } else {
        Err(ToolkitError::InvalidArgument(format!(
            "invalid {kind} name '{name}': use 1-64 letters, digits, '_', '-' or '.'"
        )))
    }
}

/// Three namespace-disjoint registries. Insertion checks and inserts under
/// one write lock, so concurrent registrations of a name have one winner.
#[derive(Default)]
pub struct CapabilitySet {
    tools: RwLock<BTreeMap<String, HostedTool>>,
    resources: RwLock<BTreeMap<String, HostedResource>>,
    prompts: RwLock<BTreeMap<String, HostedPrompt>>,
}

impl CapabilitySet {
    /// Tool names must also stay distinct once sanitized for descriptors,
    /// so `a.b` and `a_b` cannot both be registered.
    pub fn add_tool(&self, tool: HostedTool) -> Result<()> {
        let mut tools = self
            .tools
            .write()
            .map_err(|_| ToolkitError::InvalidState("tool registry lock poisoned".into()))?;
        let exposed = sanitize_tool_name(&tool.name);
        if let Some(existing) = tools
            .keys()
            .find(|existing| **existing != tool.name && sanitize_tool_name(existing) == exposed)
        {
            return Err(ToolkitError::InvalidArgument(format!(
                "tool name '{}' collides with registered tool '{existing}' as '{exposed}'",
                tool.name
            )));
        }
        insert_locked(&mut tools, CapabilityKind::Tool, tool.name.clone(), tool)
    }

    pub fn add_resource(&self, resource: HostedResource) -> Result<()> {
        insert_unique(
            &self.resources,
            CapabilityKind::Resource,
            resource.name.clone(),
            resource,
        )
    }

    pub fn add_prompt(&self, prompt: HostedPrompt) -> Result<()> {
        insert_unique(&self.prompts, CapabilityKind::Prompt, prompt.name.clone(), prompt)
    }

    pub fn tool(&self, name: &str) -> Option<HostedTool> {
        self.tools.read().ok()?.get(name).cloned()
    }

    pub fn tools(&self) -> Vec<HostedTool> {
        snapshot(&self.tools)
    }

    pub fn resources(&self) -> Vec<HostedResource> {
        snapshot(&self.resources)
    }

    pub fn resource_by_uri(&self, uri: &str) -> Option<HostedResource> {
        let name = uri.strip_prefix(RESOURCE_URI_PREFIX)?;
        self.resources.read().ok()?.get(name).cloned()
    }

    pub fn prompts(&self) -> Vec<HostedPrompt> {
        snapshot(&self.prompts)
    }

    pub fn prompt(&self, name: &str) -> Option<HostedPrompt> {
        self.prompts.read().ok()?.get(name).cloned()
    }
}

fn insert_unique<T>(
    map: &RwLock<BTreeMap<String, T>>,
    kind: CapabilityKind,
    name: String,
    value: T,
) -> Result<()> {
    let mut map = map
        .write()
        .map_err(|_| ToolkitError::InvalidState(format!("{kind} registry lock poisoned")))?;
    insert_locked(&mut map, kind, name, value)
}

fn insert_locked<T>(
    map: &mut BTreeMap<String, T>,
    kind: CapabilityKind,
    name: String,
    value: T,
) -> Result<()> {
    if map.contains_key(&name) {
        return Err(ToolkitError::duplicate(kind, name));
    }
    tracing::debug!(kind = %kind, name = %name, "registered capability");
    map.insert(name, value);
    Ok(())
}

fn snapshot<T: Clone>(map: &RwLock<BTreeMap<String, T>>) -> Vec<T> {
    map.read()
        .map(|map| map.values().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn script_tool_derives_required_parameters_and_runs() {
        let tool = HostedTool::new(
            "get_weather",
            "Weather by city",
            ToolBody::script(r#""The weather in " + city + " is sunny, temperature 25C""#),
        )
        .expect("script should compile");

        assert_eq!(tool.parameters.required(), vec!["city"]);
        let result = tool
            .execute(json!({ "city": "Paris" }), Duration::from_secs(1))
            .await
            .expect("script should evaluate");
        assert_eq!(result, json!("The weather in Paris is sunny, temperature 25C"));
    }

    #[test]
    fn script_syntax_errors_reject_registration() {
        let err = HostedTool::new("broken", "", ToolBody::script("upper(city"))
            .expect_err("unbalanced call must not compile");
        assert!(matches!(err, ToolkitError::Sandbox(_)));
    }

    #[tokio::test]
    async fn native_panics_become_tool_errors() {
        let tool = HostedTool::new(
            "explode",
            "",
            ToolBody::native(ToolParameters::empty(), |_args| async move {
                if true {
                    panic!("boom");
                }
                Ok(Value::Null)
            }),
        )
        .expect("tool should register");

        let err = tool
            .execute(json!({}), Duration::from_secs(1))
            .await
            .expect_err("panic must surface as an error");
        assert!(matches!(err, ToolkitError::ToolExecution { message, .. } if message.contains("panicked")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_native_tools_time_out() {
        let tool = HostedTool::new(
            "slow",
            "",
            ToolBody::native(ToolParameters::empty(), |_args| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            }),
        )
        .expect("tool should register");

        let err = tool
            .execute(json!({}), Duration::from_millis(100))
            .await
            .expect_err("deadline should elapse");
        assert!(matches!(err, ToolkitError::Timeout(100)));
    }

    #[test]
    fn duplicates_are_rejected_per_namespace() {
        let set = CapabilitySet::default();
        set.add_tool(HostedTool::new("readme", "first", ToolBody::script("1")).expect("tool"))
            .expect("first tool");
        let err = set
            .add_tool(HostedTool::new("readme", "second", ToolBody::script("2")).expect("tool"))
            .expect_err("second tool must be rejected");
        assert!(matches!(err, ToolkitError::DuplicateName { kind: CapabilityKind::Tool, .. }));
        assert_eq!(set.tool("readme").map(|t| t.description), Some("first".to_string()));

        set.add_resource(HostedResource::new("readme", json!("# Hi"), None).expect("resource"))
            .expect("same name in another namespace is fine");
    }

    #[test]
    fn tool_names_that_sanitize_alike_are_rejected() {
        let set = CapabilitySet::default();
        set.add_tool(HostedTool::new("a.b", "dotted", ToolBody::script("1")).expect("tool"))
            .expect("first tool");
        let err = set
            .add_tool(HostedTool::new("a_b", "underscored", ToolBody::script("2")).expect("tool"))
            .expect_err("a_b would shadow a.b");
        assert!(matches!(err, ToolkitError::InvalidArgument(msg) if msg.contains("a.b")));
        assert_eq!(set.tools().len(), 1);

        set.add_resource(HostedResource::new("a_b", json!("ok"), None).expect("resource"))
            .expect("resources are addressed by URI");
    }

    #[tokio::test]
    async fn default_arguments_are_optional_in_the_schema() {
        let tool = HostedTool::new("greet", "", ToolBody::script("'Hello ' + default(name, 'world')"))
            .expect("script should compile");
        assert!(tool.parameters.required().is_empty());
        assert!(tool.parameters.schema["properties"].get("name").is_some());
        assert_eq!(
            tool.execute(json!({}), Duration::from_secs(1)).await.expect("runs without name"),
            json!("Hello world")
        );
    }

    #[test]
    fn resources_publish_under_resource_scheme() {
        let structured = HostedResource::new("config", json!({ "debug": true }), None).expect("resource");
        assert_eq!(structured.uri, "resource://config");
        assert_eq!(structured.mime_type(), "application/json");
        assert_eq!(structured.text(), r#"{"debug":true}"#);

        let set = CapabilitySet::default();
        set.add_resource(structured).expect("add");
        assert!(set.resource_by_uri("resource://config").is_some());
        assert!(set.resource_by_uri("file://config").is_none());
    }

    #[test]
    fn prompt_placeholders_become_required_arguments() {
        let prompt = HostedPrompt::new("summarize", "Summarize {topic} in {count} bullets about {topic}", None)
            .expect("prompt");
        assert_eq!(prompt.variables, vec!["topic".to_string(), "count".to_string()]);

        let mut args = Map::new();
        args.insert("topic".into(), json!("Rust"));
        let err = prompt.render(&args).expect_err("count is missing");
        assert!(matches!(err, ToolkitError::InvalidArgument(msg) if msg.contains("count")));

        args.insert("count".into(), json!(3));
        assert_eq!(
            prompt.render(&args).expect("render"),
            "Summarize Rust in 3 bullets about Rust"
        );
    }

    #[test]
    fn invalid_names_are_rejected() {
        let err = HostedPrompt::new("has space", "x", None).expect_err("space is invalid");
        assert!(matches!(err, ToolkitError::InvalidArgument(_)));
    }
}
