use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::workspace::git;

/// The version-control operations publishing needs.
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn clone_repo(&self, url: &str, target: &Path, token: &str) -> Result<()>;

    /// Create or force-reset `branch` at HEAD and check it out.
    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    async fn stage_file(&self, dir: &Path, relative_path: &Path) -> Result<()>;

    /// Commit staged changes, returning the commit id.
    async fn commit(&self, dir: &Path, message: &str) -> Result<String>;

    /// Push `branch` to origin and track it.
    async fn push(&self, dir: &Path, branch: &str, token: &str) -> Result<()>;
}

/// In-process git via libgit2.
pub struct Git2Vcs {
    author_name: String,
    author_email: String,
    force_push: bool,
}

impl Git2Vcs {
    pub fn new(author_name: &str, author_email: &str, force_push: bool) -> Self {
        Self {
            author_name: author_name.to_string(),
            author_email: author_email.to_string(),
            force_push,
        }
    }
}

#[async_trait]
impl Vcs for Git2Vcs {
    async fn clone_repo(&self, url: &str, target: &Path, token: &str) -> Result<()> {
        git::clone(url, target, token).await
    }

    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        git::create_or_reset_branch(dir, branch).await
    }

    async fn stage_file(&self, dir: &Path, relative_path: &Path) -> Result<()> {
        git::stage_file(dir, relative_path).await
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<String> {
        git::commit(dir, message, &self.author_name, &self.author_email).await
    }

    async fn push(&self, dir: &Path, branch: &str, token: &str) -> Result<()> {
        git::push(dir, branch, token, self.force_push).await
    }
}
