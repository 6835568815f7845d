pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// The slice of the CI provider's REST API a remediation attempt needs.
///
/// Implementations are bound to one repository and credential. Status codes
/// that the remediation flow distinguishes are reported as classified errors:
/// a rejected dispatch as `TriggerRejected`, a failed run lookup as
/// `StatusQueryFailed`, a failed content fetch as `SnapshotFetchFailed` and a
/// pull request that was not created as `PublishStepFailed`.
#[async_trait]
pub trait CiPlatform: Send + Sync {
    /// Start a `workflow_dispatch` run of `workflow_id` on `git_ref`.
    async fn dispatch_workflow(&self, workflow_id: &str, git_ref: &str) -> Result<()>;

    /// List runs, most recently created first.
    async fn list_workflow_runs(&self, filter: &RunFilter) -> Result<Vec<WorkflowRun>>;

    /// Fetch a single run by id.
    async fn get_workflow_run(&self, run_id: u64) -> Result<WorkflowRun>;

    /// Fetch a file's content at a given ref.
    async fn get_file_content(&self, path: &str, git_ref: &str) -> Result<FileContent>;

    /// Open a pull request.
    async fn create_pull_request(&self, pr: &CreatePullRequest) -> Result<PullRequest>;
}
