//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the assistant the ability to act on the machine:
//! read host information, manage workspace files, open applications.
//! Every handler is modeled as an async operation; synchronous closures
//! are wrapped at registration time so the registry never branches on a
//! handler's calling convention.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::ToolError;

/// Argument mapping handed to a tool: string keys to arbitrary JSON values.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Result text for a handler that succeeded without saying anything.
pub const NO_OUTPUT: &str = "Tool executed successfully, but returned no output.";

/// The core Tool trait.
///
/// Each capability (sysinfo, fs_read, app, ...) implements this trait and is
/// registered in the [`ToolRegistry`]. Expected failure modes (a missing
/// argument, a file that isn't there) should come back as `Ok` with a
/// descriptive message; `Err` is for genuine faults.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name the model uses in a `TOOL_CALL::` line.
    fn name(&self) -> &str;

    /// One-line description for the system prompt's tool catalogue.
    fn description(&self) -> &str;

    /// Invocation example(s) for the system prompt, one per line.
    fn usage(&self) -> &str {
        ""
    }

    /// Display label used when a result is written back into history.
    fn label(&self) -> String {
        capitalize(self.name())
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError>;
}

type ToolHandler =
    dyn Fn(ToolArgs) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>> + Send + Sync;

/// Closure-backed tool, for capabilities too small to deserve their own type.
pub struct FnTool {
    name: String,
    description: String,
    usage: String,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    /// Wrap an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            usage: String::new(),
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Wrap a synchronous closure; its result is returned as an already
    /// completed future.
    pub fn from_sync<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self::new(name, description, move |args: ToolArgs| {
            std::future::ready(handler(&args))
        })
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn usage(&self) -> &str {
        &self.usage
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        (self.handler)(args.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// A registry of available tools.
///
/// Read-mostly after startup; share it across sessions behind an `Arc`.
/// [`execute`](ToolRegistry::execute) is total: whatever the handler does,
/// the caller gets a string back.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            warn!(tool = %name, "Tool is being re-registered, overwriting previous handler");
        }
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
    }

    /// Register an async closure under `name`.
    pub fn register_async<F, Fut>(&mut self, name: &str, description: &str, handler: F)
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.register(FnTool::new(name, description, handler));
    }

    /// Register a synchronous closure under `name`.
    pub fn register_fn<F>(&mut self, name: &str, description: &str, handler: F)
    where
        F: Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        self.register(FnTool::from_sync(name, description, handler));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// All tools, sorted by name.
    pub fn tools(&self) -> Vec<&dyn Tool> {
        let mut tools: Vec<&dyn Tool> = self.tools.values().map(|t| t.as_ref()).collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// History label for a tool; unregistered names get the capitalized name.
    pub fn label(&self, name: &str) -> String {
        self.tools
            .get(name)
            .map(|t| t.label())
            .unwrap_or_else(|| capitalize(name))
    }

    /// Execute a tool by name. Never fails: unknown tools, handler errors and
    /// handler panics all come back as descriptive error text.
    pub async fn execute(&self, name: &str, args: &ToolArgs) -> String {
        let Some(tool) = self.tools.get(name) else {
            error!(tool = %name, "Attempted to execute unknown tool");
            return format!(
                "Error: Unknown tool '{}'. Available tools: {}",
                name,
                self.names().join(", ")
            );
        };

        info!(tool = %name, args = %serde_json::Value::Object(args.clone()), "Executing tool");

        let outcome = AssertUnwindSafe(tool.execute(args)).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(ToolError::Panicked {
                tool_name: name.to_string(),
                reason: panic_message(payload.as_ref()),
            }),
        };

        match result {
            Ok(output) if output.trim().is_empty() => {
                info!(tool = %name, "Tool executed with no output");
                NO_OUTPUT.to_string()
            }
            Ok(output) => {
                info!(tool = %name, "Tool executed successfully");
                output
            }
            Err(e) => {
                error!(tool = %name, error = %e, "Tool execution failed");
                format!(
                    "Error: An exception occurred while executing tool '{}': {} - {}",
                    name,
                    e.kind(),
                    e
                )
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Uppercase the first character, lowercase the rest.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
