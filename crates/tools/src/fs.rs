//! Workspace filesystem tools: `fs_list`, `fs_read`, `fs_write`,
//! `fs_mkdir` and `fs_find`.
//!
//! All five share one [`Workspace`]. Expected failures (missing argument,
//! path outside the sandbox, file not found) are answered with an
//! `Error: ...` string so the model can correct itself; only unexpected I/O
//! faults become `ToolError`s.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use joi_core::error::ToolError;
use joi_core::tool::{Tool, ToolArgs};
use tracing::{debug, info, warn};

use crate::workspace::{Workspace, WorkspacePath};
use crate::{arg_string, workspace};

/// Largest file `fs_read` will return.
pub const MAX_READ_BYTES: u64 = 1024 * 1024;

/// Cap on the number of paths `fs_find` reports.
pub const MAX_FIND_RESULTS: usize = 200;

/// Resolve `input` or produce the model-facing refusal text.
async fn resolve_or_refuse(
    workspace: &Workspace,
    input: &str,
    refusal: impl FnOnce(&str) -> String,
) -> Result<WorkspacePath, String> {
    match workspace.resolve(input).await {
        Ok(resolved) => Ok(resolved),
        Err(workspace::WorkspaceError::Unavailable(e)) => {
            Err(format!("Error: Workspace directory not available: {e}"))
        }
        Err(e) => {
            debug!(path = %input, reason = %e, "Workspace path refused");
            Err(refusal(input))
        }
    }
}

fn bullet_list(header: String, items: &[String]) -> String {
    format!("{header}\n- {}", items.join("\n- "))
}

// --- fs_list ---

/// Lists the entries of a workspace directory.
pub struct FsListTool {
    workspace: Arc<Workspace>,
}

impl FsListTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FsListTool {
    fn name(&self) -> &str {
        "fs_list"
    }

    fn description(&self) -> &str {
        "Lists files and folders in a workspace directory. Use \".\" for the workspace root."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "fs_list", "args": {"relative_path": "."}}"#
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let Some(input) = arg_string(args, "relative_path") else {
            return Ok("Error: Missing 'relative_path' argument for fs_list.".into());
        };
        let target = match resolve_or_refuse(&self.workspace, &input, |p| {
            format!("Error: Invalid or disallowed workspace path '{p}'.")
        })
        .await
        {
            Ok(target) => target,
            Err(text) => return Ok(text),
        };

        let Ok(metadata) = tokio::fs::metadata(&target.path).await else {
            return Ok(format!("Error: Workspace path '{}' does not exist.", target.relative));
        };
        if !metadata.is_dir() {
            return Ok(format!("Error: Workspace path '{}' is not a directory.", target.relative));
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&target.path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push((name, is_dir));
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(format!("Workspace directory '{}' is empty.", target.relative));
        }

        info!(path = %target.relative, entries = entries.len(), "Listed workspace directory");
        let items: Vec<String> = entries
            .into_iter()
            .map(|(name, is_dir)| format!("[{}] {name}", if is_dir { "D" } else { "F" }))
            .collect();
        Ok(bullet_list(
            format!("Contents of workspace path '{}':", target.relative),
            &items,
        ))
    }
}

// --- fs_read ---

/// Reads a UTF-8 text file from the workspace.
pub struct FsReadTool {
    workspace: Arc<Workspace>,
    max_bytes: u64,
}

impl FsReadTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            max_bytes: MAX_READ_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl Tool for FsReadTool {
    fn name(&self) -> &str {
        "fs_read"
    }

    fn description(&self) -> &str {
        "Reads a plain text file from the workspace."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "fs_read", "args": {"relative_path": "notes/todo.txt"}}"#
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let Some(input) = arg_string(args, "relative_path") else {
            return Ok("Error: Missing 'relative_path' argument for fs_read.".into());
        };
        let target = match resolve_or_refuse(&self.workspace, &input, |p| {
            format!("Error: Invalid or disallowed workspace path '{p}'.")
        })
        .await
        {
            Ok(target) => target,
            Err(text) => return Ok(text),
        };

        let Ok(metadata) = tokio::fs::metadata(&target.path).await else {
            return Ok(format!("Error: Workspace file '{}' does not exist.", target.relative));
        };
        if !metadata.is_file() {
            return Ok(format!("Error: Workspace path '{}' is not a file.", target.relative));
        }
        if metadata.len() > self.max_bytes {
            warn!(path = %target.relative, size = metadata.len(), "Refusing to read oversized file");
            return Ok(format!(
                "Error: Workspace file '{}' is too large to read ({} bytes, limit {} bytes).",
                target.relative,
                metadata.len(),
                self.max_bytes
            ));
        }

        let bytes = tokio::fs::read(&target.path).await?;
        match String::from_utf8(bytes) {
            Ok(content) => {
                info!(path = %target.relative, bytes = content.len(), "Read workspace file");
                Ok(format!("Content of workspace file '{}':\n\n{content}", target.relative))
            }
            Err(_) => Ok(format!(
                "Error: Could not read file '{}' as UTF-8 text. It might be a binary file or use a different encoding.",
                target.relative
            )),
        }
    }
}

// --- fs_write ---

/// Writes plain text to a workspace file, creating parent directories.
pub struct FsWriteTool {
    workspace: Arc<Workspace>,
}

impl FsWriteTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FsWriteTool {
    fn name(&self) -> &str {
        "fs_write"
    }

    fn description(&self) -> &str {
        "Writes plain text to a workspace file, replacing it if it exists. Parent folders are created."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "fs_write", "args": {"relative_path": "notes/todo.txt", "content": "Buy milk"}}"#
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let Some(input) = arg_string(args, "relative_path") else {
            return Ok("Error: Missing 'relative_path' argument for fs_write.".into());
        };
        let Some(content) = arg_string(args, "content") else {
            return Ok("Error: Missing 'content' argument for fs_write.".into());
        };
        let target = match resolve_or_refuse(&self.workspace, &input, |p| {
            format!("Error: Invalid or disallowed workspace path '{p}'. Cannot write file.")
        })
        .await
        {
            Ok(target) => target,
            Err(text) => return Ok(text),
        };

        if target.is_root() {
            return Ok("Error: Cannot write to the workspace root directory itself.".into());
        }
        if tokio::fs::metadata(&target.path)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            return Ok(format!(
                "Error: Workspace path '{}' is a directory. Cannot overwrite it with a file.",
                target.relative
            ));
        }

        if let Some(parent) = target.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target.path, content.as_bytes()).await?;

        info!(path = %target.relative, bytes = content.len(), "Wrote workspace file");
        Ok(format!(
            "Successfully wrote plain text content to workspace file '{}'.",
            target.relative
        ))
    }
}

// --- fs_mkdir ---

/// Creates a workspace directory, including missing parents.
pub struct FsMkdirTool {
    workspace: Arc<Workspace>,
}

impl FsMkdirTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FsMkdirTool {
    fn name(&self) -> &str {
        "fs_mkdir"
    }

    fn description(&self) -> &str {
        "Creates a folder in the workspace, including any missing parent folders."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "fs_mkdir", "args": {"relative_path": "projects/new"}}"#
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let Some(input) = arg_string(args, "relative_path") else {
            return Ok("Error: Missing 'relative_path' argument for fs_mkdir.".into());
        };
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok("Error: Cannot create directory with an empty name or just '.'.".into());
        }
        let target = match resolve_or_refuse(&self.workspace, trimmed, |p| {
            format!("Error: Invalid or disallowed workspace path '{p}'. Cannot create directory.")
        })
        .await
        {
            Ok(target) => target,
            Err(text) => return Ok(text),
        };

        if target.is_root() {
            return Ok("Error: Cannot explicitly create the root workspace directory.".into());
        }
        if let Ok(metadata) = tokio::fs::metadata(&target.path).await {
            return Ok(if metadata.is_dir() {
                format!("Workspace directory '{}' already exists.", target.relative)
            } else {
                format!(
                    "Error: Cannot create directory. Path '{}' already exists as a file in the workspace.",
                    target.relative
                )
            });
        }

        tokio::fs::create_dir_all(&target.path).await?;
        info!(path = %target.relative, "Created workspace directory");
        Ok(format!("Successfully created workspace directory '{}'.", target.relative))
    }
}

// --- fs_find ---

/// Recursive glob search below a workspace directory.
pub struct FsFindTool {
    workspace: Arc<Workspace>,
}

impl FsFindTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

/// Patterns must stay relative: no roots, drive letters or `..`.
fn pattern_is_allowed(pattern: &str) -> bool {
    !(pattern.starts_with('/')
        || pattern.starts_with('\\')
        || pattern.contains(':')
        || pattern.contains(".."))
}

#[async_trait]
impl Tool for FsFindTool {
    fn name(&self) -> &str {
        "fs_find"
    }

    fn description(&self) -> &str {
        "Finds files matching a glob pattern (e.g. \"*.txt\") recursively below a workspace folder."
    }

    fn usage(&self) -> &str {
        r#"TOOL_CALL::{"tool": "fs_find", "args": {"start_path": ".", "pattern": "*.md"}}"#
    }

    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let Some(start) = arg_string(args, "start_path") else {
            return Ok("Error: Missing 'start_path' argument for fs_find.".into());
        };
        let Some(pattern) = arg_string(args, "pattern") else {
            return Ok("Error: Missing 'pattern' argument for fs_find.".into());
        };
        let pattern = pattern.trim().to_string();
        if pattern.is_empty() {
            return Ok("Error: Search pattern cannot be empty.".into());
        }
        if !pattern_is_allowed(&pattern) {
            return Ok(format!(
                "Error: Invalid search pattern '{pattern}'. Pattern should be relative and not contain '..'."
            ));
        }

        let target = match resolve_or_refuse(&self.workspace, &start, |p| {
            format!("Error: Invalid or disallowed workspace start path '{p}'. Cannot search.")
        })
        .await
        {
            Ok(target) => target,
            Err(text) => return Ok(text),
        };
        if !tokio::fs::metadata(&target.path)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            return Ok(format!(
                "Error: Workspace start path '{}' is not a directory.",
                target.relative
            ));
        }

        let full_pattern = format!(
            "{}/**/{}",
            glob::Pattern::escape(&target.path.to_string_lossy()),
            pattern
        );
        let matches = tokio::task::spawn_blocking(move || glob_files(&full_pattern))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "fs_find".into(),
                reason: e.to_string(),
            })?
            .map_err(|e| ToolError::InvalidArguments(format!("bad glob pattern: {e}")))?;

        let mut found = Vec::with_capacity(matches.len());
        for path in matches {
            // glob descends through symlinked directories.
            if !self.workspace.contains(&path).await {
                debug!(path = %path.display(), "Skipping match outside the workspace");
                continue;
            }
            if let Some(relative) = self.workspace.relative_display(&path).await {
                found.push(relative);
            }
        }
        found.sort();

        if found.is_empty() {
            return Ok(format!(
                "No files found matching pattern '{pattern}' within workspace path '{}'.",
                target.relative
            ));
        }

        info!(pattern = %pattern, start = %target.relative, found = found.len(), "Workspace search finished");
        let total = found.len();
        if total > MAX_FIND_RESULTS {
            found.truncate(MAX_FIND_RESULTS);
            found.push(format!("... ({} more)", total - MAX_FIND_RESULTS));
        }
        Ok(bullet_list(
            format!(
                "Files found matching '{pattern}' in workspace path '{}':",
                target.relative
            ),
            &found,
        ))
    }
}

/// Regular files matching `pattern`; unreadable entries are skipped.
fn glob_files(pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    Ok(glob::glob(pattern)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    fn workspace() -> (tempfile::TempDir, Arc<Workspace>) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Arc::new(Workspace::new(dir.path()));
        (dir, workspace)
    }

    #[tokio::test]
    async fn list_sorts_entries_and_marks_directories() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let out = FsListTool::new(ws)
            .execute(&args(json!({"relative_path": "."})))
            .await
            .unwrap();
        assert_eq!(out, "Contents of workspace path '.':\n- [D] a_dir\n- [F] b.txt");
    }

    #[tokio::test]
    async fn list_reports_missing_empty_and_file_targets() {
        let (dir, ws) = workspace();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();
        let tool = FsListTool::new(ws);

        let missing = tool.execute(&args(json!({}))).await.unwrap();
        assert_eq!(missing, "Error: Missing 'relative_path' argument for fs_list.");

        let empty = tool.execute(&args(json!({"relative_path": "empty"}))).await.unwrap();
        assert_eq!(empty, "Workspace directory 'empty' is empty.");

        let file = tool.execute(&args(json!({"relative_path": "f.txt"}))).await.unwrap();
        assert!(file.contains("is not a directory"));

        let nowhere = tool.execute(&args(json!({"relative_path": "nope"}))).await.unwrap();
        assert!(nowhere.contains("does not exist"));

        let escape = tool.execute(&args(json!({"relative_path": "../.."}))).await.unwrap();
        assert_eq!(escape, "Error: Invalid or disallowed workspace path '../..'.");
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (_dir, ws) = workspace();
        let written = FsWriteTool::new(ws.clone())
            .execute(&args(json!({"relative_path": "notes/todo.txt", "content": "Buy milk"})))
            .await
            .unwrap();
        assert_eq!(
            written,
            "Successfully wrote plain text content to workspace file 'notes/todo.txt'."
        );

        let read = FsReadTool::new(ws)
            .execute(&args(json!({"relative_path": "notes/todo.txt"})))
            .await
            .unwrap();
        assert_eq!(read, "Content of workspace file 'notes/todo.txt':\n\nBuy milk");
    }

    #[tokio::test]
    async fn write_refuses_root_and_directories() {
        let (dir, ws) = workspace();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let tool = FsWriteTool::new(ws);

        let root = tool
            .execute(&args(json!({"relative_path": ".", "content": "x"})))
            .await
            .unwrap();
        assert_eq!(root, "Error: Cannot write to the workspace root directory itself.");

        let over_dir = tool
            .execute(&args(json!({"relative_path": "docs", "content": "x"})))
            .await
            .unwrap();
        assert!(over_dir.contains("is a directory"));

        let no_content = tool
            .execute(&args(json!({"relative_path": "a.txt"})))
            .await
            .unwrap();
        assert_eq!(no_content, "Error: Missing 'content' argument for fs_write.");

        let absolute = tool
            .execute(&args(json!({"relative_path": "/tmp/evil.txt", "content": "x"})))
            .await
            .unwrap();
        assert!(absolute.starts_with("Error: Invalid or disallowed workspace path"));
    }

    #[tokio::test]
    async fn read_refuses_binary_and_oversized_files() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        std::fs::write(dir.path().join("big.txt"), "0123456789").unwrap();

        let binary = FsReadTool::new(ws.clone())
            .execute(&args(json!({"relative_path": "blob.bin"})))
            .await
            .unwrap();
        assert!(binary.starts_with("Error: Could not read file 'blob.bin' as UTF-8 text"));

        let big = FsReadTool::new(ws)
            .with_max_bytes(4)
            .execute(&args(json!({"relative_path": "big.txt"})))
            .await
            .unwrap();
        assert!(big.contains("too large"));
    }

    #[tokio::test]
    async fn mkdir_creates_nested_and_reports_existing() {
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("taken"), "x").unwrap();
        let tool = FsMkdirTool::new(ws);

        let created = tool
            .execute(&args(json!({"relative_path": "projects/new"})))
            .await
            .unwrap();
        assert_eq!(created, "Successfully created workspace directory 'projects/new'.");
        assert!(dir.path().join("projects/new").is_dir());

        let again = tool
            .execute(&args(json!({"relative_path": "projects/new"})))
            .await
            .unwrap();
        assert_eq!(again, "Workspace directory 'projects/new' already exists.");

        let file = tool.execute(&args(json!({"relative_path": "taken"}))).await.unwrap();
        assert!(file.contains("already exists as a file"));

        let dot = tool.execute(&args(json!({"relative_path": "."}))).await.unwrap();
        assert_eq!(dot, "Error: Cannot create directory with an empty name or just '.'.");
    }

    #[tokio::test]
    async fn find_matches_recursively_and_sorts() {
        let (dir, ws) = workspace();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top.md"), "").unwrap();
        std::fs::write(dir.path().join("a/b/deep.md"), "").unwrap();
        std::fs::write(dir.path().join("a/skip.txt"), "").unwrap();
        let tool = FsFindTool::new(ws);

        let out = tool
            .execute(&args(json!({"start_path": ".", "pattern": "*.md"})))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Files found matching '*.md' in workspace path '.':\n- a/b/deep.md\n- top.md"
        );

        let scoped = tool
            .execute(&args(json!({"start_path": "a", "pattern": "*.txt"})))
            .await
            .unwrap();
        assert!(scoped.ends_with("- a/skip.txt"));

        let none = tool
            .execute(&args(json!({"start_path": ".", "pattern": "*.rs"})))
            .await
            .unwrap();
        assert_eq!(none, "No files found matching pattern '*.rs' within workspace path '.'.");
    }

    #[tokio::test]
    async fn find_rejects_escaping_patterns() {
        let (_dir, ws) = workspace();
        let tool = FsFindTool::new(ws);
        for pattern in ["../*", "/etc/*", "C:*"] {
            let out = tool
                .execute(&args(json!({"start_path": ".", "pattern": pattern})))
                .await
                .unwrap();
            assert!(out.starts_with("Error: Invalid search pattern"), "{pattern}: {out}");
        }
        let empty = tool
            .execute(&args(json!({"start_path": ".", "pattern": "  "})))
            .await
            .unwrap();
        assert_eq!(empty, "Error: Search pattern cannot be empty.");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn find_skips_files_behind_escaping_links() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        let (dir, ws) = workspace();
        std::fs::write(dir.path().join("mine.txt"), "m").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let out = FsFindTool::new(ws)
            .execute(&args(json!({"start_path": ".", "pattern": "*.txt"})))
            .await
            .unwrap();
        assert_eq!(out, "Files found matching '*.txt' in workspace path '.':\n- mine.txt");
    }

    #[tokio::test]
    async fn find_caps_results() {
        let (dir, ws) = workspace();
        for i in 0..(MAX_FIND_RESULTS + 3) {
            std::fs::write(dir.path().join(format!("f{i:04}.log")), "").unwrap();
        }
        let out = FsFindTool::new(ws)
            .execute(&args(json!({"start_path": ".", "pattern": "*.log"})))
            .await
            .unwrap();
        assert!(out.ends_with("- ... (3 more)"));
        assert_eq!(out.lines().count(), 1 + MAX_FIND_RESULTS + 1);
    }
}
