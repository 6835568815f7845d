use std::path::{Component, Path, PathBuf};

use crate::config::WorkspaceConfig;
use crate::error::{AppError, Result};

/// Manages the per-attempt clone directories used for publishing.
pub struct WorkspaceManager {
    base_dir: PathBuf,
    keep_clone: bool,
}

/// A working directory reserved for one remediation attempt.
pub struct Workspace {
    pub path: PathBuf,
    pub branch: String,
}

impl WorkspaceManager {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            base_dir: config.clone_dir.clone(),
            keep_clone: config.keep_clone,
        }
    }

    /// Reserve a fresh, empty directory for cloning `repo_full_name` on `branch`.
    pub async fn prepare(&self, repo_full_name: &str, branch: &str) -> Result<Workspace> {
        let path = self.workspace_path(repo_full_name, branch);

        if path.exists() {
            tokio::fs::remove_dir_all(&path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to clean workspace: {e}")))?;
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create workspace dir: {e}")))?;
        }

        Ok(Workspace {
            path,
            branch: branch.to_string(),
        })
    }

    /// Write `contents` to `relative_path` inside the workspace, creating
    /// parent directories. Returns the path written.
    pub async fn place_file(
        &self,
        workspace: &Workspace,
        relative_path: &Path,
        contents: &str,
    ) -> Result<PathBuf> {
        let full_path = Self::verify_path(&workspace.path, relative_path)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to create directory: {e}")))?;
        }
        tokio::fs::write(&full_path, contents)
            .await
            .map_err(|e| AppError::Workspace(format!("Failed to write {}: {e}", full_path.display())))?;
        Ok(full_path)
    }

    /// Remove a workspace directory unless clones are kept for inspection.
    pub async fn cleanup(&self, workspace: &Workspace) -> Result<()> {
        if self.keep_clone {
            tracing::info!(path = %workspace.path.display(), "Keeping working clone");
            return Ok(());
        }
        if workspace.path.exists() {
            tokio::fs::remove_dir_all(&workspace.path)
                .await
                .map_err(|e| AppError::Workspace(format!("Failed to cleanup workspace: {e}")))?;
        }
        Ok(())
    }

    fn workspace_path(&self, repo_full_name: &str, branch: &str) -> PathBuf {
        let safe_name = repo_full_name.replace('/', "__");
        let safe_branch = branch.replace('/', "__");
        self.base_dir.join(format!("{safe_name}__{safe_branch}"))
    }

    /// Resolve a repository-relative path inside `workspace_root`, rejecting
    /// absolute paths and any `..` component.
    pub fn verify_path(workspace_root: &Path, requested_path: &Path) -> Result<PathBuf> {
        let mut resolved = workspace_root.to_path_buf();
        let mut depth = 0usize;

        for component in requested_path.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(AppError::Workspace(format!(
                        "Path traversal detected: {} is outside workspace",
                        requested_path.display()
                    )));
                }
            }
        }

        if depth == 0 {
            return Err(AppError::Workspace("Invalid file path".to_string()));
        }
        Ok(resolved)
    }
}
