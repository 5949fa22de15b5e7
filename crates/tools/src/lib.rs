//! Built-in tool implementations for Joi.
//!
//! Tools give the assistant the ability to act on this machine:
//! report host information, manage files inside a sandboxed workspace
//! directory, and open applications.

pub mod app;
pub mod fs;
pub mod system;
pub mod workspace;

use std::sync::Arc;

use joi_config::ToolsConfig;
use joi_core::tool::{ToolArgs, ToolRegistry};
use serde_json::Value;

pub use workspace::{Workspace, WorkspaceError, WorkspacePath};

/// Create the default tool registry with all built-in tools.
///
/// The filesystem tools share one workspace rooted at
/// `tools.workspace_dir`; the directory is created on first use. `app` is
/// only registered when `tools.enable_app_launcher` is set.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let workspace = Arc::new(Workspace::new(config.workspace_dir()));

    let mut registry = ToolRegistry::new();
    registry.register(system::SysinfoTool);
    registry.register(fs::FsListTool::new(workspace.clone()));
    registry.register(fs::FsReadTool::new(workspace.clone()));
    registry.register(fs::FsWriteTool::new(workspace.clone()));
    registry.register(fs::FsMkdirTool::new(workspace.clone()));
    registry.register(fs::FsFindTool::new(workspace));
    if config.enable_app_launcher {
        registry.register(app::AppTool::new());
    }
    registry
}

/// A string argument. Scalars are stringified; null and missing are `None`.
pub(crate) fn arg_string(args: &ToolArgs, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
