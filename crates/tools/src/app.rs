//! App tool: launches a desktop application through the platform opener.

use async_trait::async_trait;
use joi_core::error::ToolError;
use joi_core::tool::{Tool, ToolArgs};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::arg_string;

/// The program (plus leading arguments) that opens an application by name.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: String,
    leading_args: Vec<String>,
}

impl Launcher {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// `open -a` on macOS, `cmd /C start` on Windows, `gtk-launch` elsewhere.
    pub fn platform() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("open", vec!["-a".into()])
        } else if cfg!(target_os = "windows") {
            Self::new("cmd", vec!["/C".into(), "start".into(), String::new()])
        } else {
            Self::new("gtk-launch", Vec::new())
        }
    }

    fn command(&self, app_name: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(app_name)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        command
    }
}

pub struct AppTool {
    launcher: Launcher,
}

impl AppTool {
    pub fn new() -> Self {
        Self::with_launcher(Launcher::platform())
    }

    pub fn with_launcher(launcher: Launcher) -> Self {
        Self { launcher }
    }
}

impl Default for AppTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AppTool {
    fn name(&self) -> &str {
        "app"
    }

    fn description(&self) -> &str {
        "Opens an application on this computer by name."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "app", "args": {"app_name": "calculator"}}"#
    }

    fn label(&self) -> String {
        "Application".into()
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let app_name = arg_string(args, "app_name").unwrap_or_default();
        let app_name = app_name.trim();
        if app_name.is_empty() {
            return Ok("Error: Missing 'app_name' argument for the app tool.".into());
        }
        if app_name.chars().any(char::is_control) {
            return Ok(format!("Error: Invalid application name '{}'.", app_name.escape_default()));
        }

        debug!(app = %app_name, launcher = %self.launcher.program, "Launching application");
        // Detached: the launcher's exit status says nothing about the app.
        match self.launcher.command(app_name).spawn() {
            Ok(_child) => Ok(format!("Attempted to open application: {app_name}")),
            Err(e) => {
                warn!(app = %app_name, error = %e, "Failed to launch application");
                Ok(format!("Error opening application {app_name}: {e}"))
            }
        }
    }
}
