//! Workspace sandbox: confines the filesystem tools to one directory.
//!
//! Paths from the model are always relative to the workspace root. Absolute
//! paths and `..` components are refused outright; everything else is
//! joined onto the root and checked again after symlinks are resolved, so a
//! link inside the workspace cannot be used to reach outside it.

use std::path::{Component, Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Why a relative path was refused.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("empty path")]
    Empty,

    #[error("absolute path '{0}' is not allowed")]
    Absolute(String),

    #[error("path traversal detected in '{0}'")]
    Traversal(String),

    #[error("path '{0}' resolves outside the workspace")]
    Escapes(String),

    #[error("workspace directory unavailable: {0}")]
    Unavailable(String),
}

/// A path inside the workspace that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePath {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Display form relative to the root, `.` for the root itself.
    pub relative: String,
}

impl WorkspacePath {
    pub fn is_root(&self) -> bool {
        self.relative == "."
    }
}

/// The sandbox root. The directory is created on first use.
#[derive(Debug)]
pub struct Workspace {
    configured: PathBuf,
    root: OnceCell<PathBuf>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            configured: root.into(),
            root: OnceCell::new(),
        }
    }

    /// The configured root, as given.
    pub fn configured_root(&self) -> &Path {
        &self.configured
    }

    /// The canonical root, creating the directory if needed.
    pub async fn root(&self) -> Result<&Path, WorkspaceError> {
        self.root
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.configured)
                    .await
                    .map_err(|e| WorkspaceError::Unavailable(e.to_string()))?;
                let canonical = tokio::fs::canonicalize(&self.configured)
                    .await
                    .map_err(|e| WorkspaceError::Unavailable(e.to_string()))?;
                info!(workspace = %canonical.display(), "Workspace directory ready");
                Ok::<_, WorkspaceError>(canonical)
            })
            .await
            .map(PathBuf::as_path)
    }

    /// Validate `relative` and resolve it against the root.
    pub async fn resolve(&self, relative: &str) -> Result<WorkspacePath, WorkspaceError> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            return Err(WorkspaceError::Empty);
        }

        let mut cleaned = PathBuf::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => cleaned.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    warn!(path = %trimmed, "Rejected traversal component in workspace path");
                    return Err(WorkspaceError::Traversal(trimmed.into()));
                }
                Component::RootDir | Component::Prefix(_) => {
                    warn!(path = %trimmed, "Rejected absolute workspace path");
                    return Err(WorkspaceError::Absolute(trimmed.into()));
                }
            }
        }

        let root = self.root().await?;
        let path = root.join(&cleaned);
        self.check_links(root, &path, trimmed).await?;

        let relative = if cleaned.as_os_str().is_empty() {
            ".".to_string()
        } else {
            display_relative(&cleaned)
        };
        Ok(WorkspacePath { path, relative })
    }

    /// Display form of an absolute path below the root.
    pub async fn relative_display(&self, path: &Path) -> Option<String> {
        let root = self.root().await.ok()?;
        let rest = path.strip_prefix(root).ok()?;
        if rest.as_os_str().is_empty() {
            Some(".".into())
        } else {
            Some(display_relative(rest))
        }
    }

    /// Whether an existing `path` really lives under the root once symlinks
    /// are followed.
    pub async fn contains(&self, path: &Path) -> bool {
        let Ok(root) = self.root().await else {
            return false;
        };
        match tokio::fs::canonicalize(path).await {
            Ok(real) => real.starts_with(root),
            Err(_) => false,
        }
    }

    /// Every existing prefix of `path` must canonicalize to somewhere under
    /// the root. A dangling symlink counts as an escape.
    async fn check_links(&self, root: &Path, path: &Path, input: &str) -> Result<(), WorkspaceError> {
        for ancestor in path.ancestors() {
            if !ancestor.starts_with(root) || ancestor == root {
                break;
            }
            if tokio::fs::symlink_metadata(ancestor).await.is_err() {
                continue;
            }
            let inside = match tokio::fs::canonicalize(ancestor).await {
                Ok(real) => real.starts_with(root),
                Err(_) => false,
            };
            if !inside {
                warn!(path = %input, resolved = %ancestor.display(), "Workspace path escapes the sandbox");
                return Err(WorkspaceError::Escapes(input.into()));
            }
            break;
        }
        Ok(())
    }
}

fn display_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
