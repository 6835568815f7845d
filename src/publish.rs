use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::PublishConfig;
use crate::error::{AppError, Result};
use crate::platform::types::{CreatePullRequest, PullRequest, RunConclusion, WorkflowRun};
use crate::platform::CiPlatform;
use crate::shutdown::CancelSignal;
use crate::workspace::{Vcs, Workspace, WorkspaceManager};

/// Stages of publishing, in order. A failure names the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    Clone,
    Branch,
    Write,
    Stage,
    Commit,
    Push,
    PullRequest,
}

impl PublishStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStep::Clone => "clone",
            PublishStep::Branch => "branch",
            PublishStep::Write => "write",
            PublishStep::Stage => "stage",
            PublishStep::Commit => "commit",
            PublishStep::Push => "push",
            PublishStep::PullRequest => "pull_request",
        }
    }
}

impl std::fmt::Display for PublishStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The repository a fix is published to.
#[derive(Debug, Clone)]
pub struct RepoRef {
    pub full_name: String,
    pub clone_url: String,
    pub base_branch: String,
}

/// Everything needed to turn a corrected document into a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeProposal {
    pub branch: String,
    /// Repository-relative destination; always the original workflow path.
    pub file_path: String,
    pub commit_message: String,
    pub title: String,
    pub body: String,
    pub base_branch: String,
}

impl ChangeProposal {
    pub fn new(settings: &PublishConfig, repo: &RepoRef, file_path: &str, branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            file_path: file_path.to_string(),
            commit_message: settings.commit_message.clone(),
            title: settings.pr_title.clone(),
            body: settings.pr_body.clone(),
            base_branch: repo.base_branch.clone(),
        }
    }

    /// Point reviewers at the run that failed.
    pub fn with_run_details(mut self, run: &WorkflowRun, conclusion: RunConclusion) -> Self {
        let run_ref = run
            .html_url
            .clone()
            .unwrap_or_else(|| format!("run {}", run.id));
        self.body.push_str(&format!(
            "\n\n---\nWorkflow `{}` concluded `{conclusion}` in {run_ref}.",
            self.file_path
        ));
        self
    }
}

/// Branch name for an attempt started at `now`.
pub fn remediation_branch(prefix: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{prefix}-{}", now.format("%Y%m%dT%H%M%SZ"))
}

fn failed(step: PublishStep) -> impl Fn(AppError) -> AppError {
    move |e| match e {
        already @ AppError::PublishStepFailed { .. } => already,
        other => AppError::PublishStepFailed {
            step,
            reason: other.to_string(),
        },
    }
}

/// Commits a corrected document to a new branch and opens a pull request.
///
/// Steps run strictly in order; the first failure aborts and nothing already
/// pushed is rolled back. Cancellation is honoured before the clone, the push
/// and the pull request, never in the middle of a step. The working clone is removed afterwards either way.
pub struct ChangePublisher {
    platform: Arc<dyn CiPlatform>,
    vcs: Arc<dyn Vcs>,
    workspaces: WorkspaceManager,
}

impl ChangePublisher {
    pub fn new(
        platform: Arc<dyn CiPlatform>,
        vcs: Arc<dyn Vcs>,
        workspaces: WorkspaceManager,
    ) -> Self {
        Self {
            platform,
            vcs,
            workspaces,
        }
    }

    pub async fn publish(
        &self,
        corrected: &str,
        repo: &RepoRef,
        proposal: &ChangeProposal,
        token: &str,
        cancel: &CancelSignal,
    ) -> Result<PullRequest> {
        cancel.check()?;
        let workspace = self
            .workspaces
            .prepare(&repo.full_name, &proposal.branch)
            .await
            .map_err(failed(PublishStep::Clone))?;

        let result = self
            .publish_in(&workspace, corrected, repo, proposal, token, cancel)
            .await;

        if let Err(e) = self.workspaces.cleanup(&workspace).await {
            tracing::warn!(path = %workspace.path.display(), error = %e, "Failed to remove working clone");
        }

        match &result {
            Ok(pr) => tracing::info!(
                pr = pr.number,
                url = ?pr.html_url,
                branch = %proposal.branch,
                "Pull request created"
            ),
            Err(e) => tracing::error!(branch = %proposal.branch, error = %e, "Publishing failed"),
        }
        result
    }

    async fn publish_in(
        &self,
        workspace: &Workspace,
        corrected: &str,
        repo: &RepoRef,
        proposal: &ChangeProposal,
        token: &str,
        cancel: &CancelSignal,
    ) -> Result<PullRequest> {
        let dir = workspace.path.as_path();
        let file_path = Path::new(&proposal.file_path);

        self.vcs
            .clone_repo(&repo.clone_url, dir, token)
            .await
            .map_err(failed(PublishStep::Clone))?;
        tracing::info!(repo = %repo.full_name, path = %dir.display(), "Cloned repository");

        self.vcs
            .create_branch(dir, &proposal.branch)
            .await
            .map_err(failed(PublishStep::Branch))?;

        self.workspaces
            .place_file(workspace, file_path, corrected)
            .await
            .map_err(failed(PublishStep::Write))?;

        self.vcs
            .stage_file(dir, file_path)
            .await
            .map_err(failed(PublishStep::Stage))?;

        let commit = self
            .vcs
            .commit(dir, &proposal.commit_message)
            .await
            .map_err(failed(PublishStep::Commit))?;
        tracing::info!(commit = %commit, branch = %proposal.branch, "Committed correction");

        cancel.check()?;
        self.vcs
            .push(dir, &proposal.branch, token)
            .await
            .map_err(failed(PublishStep::Push))?;
        tracing::info!(branch = %proposal.branch, "Pushed branch");

        cancel.check()?;
        self.platform
            .create_pull_request(&CreatePullRequest {
                title: proposal.title.clone(),
                body: proposal.body.clone(),
                head_branch: proposal.branch.clone(),
                base_branch: proposal.base_branch.clone(),
            })
            .await
            .map_err(failed(PublishStep::PullRequest))
    }
}
