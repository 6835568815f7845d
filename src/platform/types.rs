use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Terminal outcome of a completed workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    StartupFailure,
    Cancelled,
    Skipped,
    Neutral,
    TimedOut,
    ActionRequired,
    Stale,
    #[serde(other)]
    Unknown,
}

impl RunConclusion {
    /// Only these conclusions warrant asking for a corrected workflow.
    pub fn needs_remediation(&self) -> bool {
        matches!(self, RunConclusion::Failure | RunConclusion::StartupFailure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunConclusion::Success => "success",
            RunConclusion::Failure => "failure",
            RunConclusion::StartupFailure => "startup_failure",
            RunConclusion::Cancelled => "cancelled",
            RunConclusion::Skipped => "skipped",
            RunConclusion::Neutral => "neutral",
            RunConclusion::TimedOut => "timed_out",
            RunConclusion::ActionRequired => "action_required",
            RunConclusion::Stale => "stale",
            RunConclusion::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workflow run as reported by the CI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Narrows a run listing to the runs we could have started.
#[derive(Debug, Clone)]
pub struct RunFilter {
    pub workflow_id: String,
    pub branch: String,
    pub event: String,
    pub per_page: u8,
}

impl RunFilter {
    pub fn dispatched(workflow_id: &str, branch: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            branch: branch.to_string(),
            event: "workflow_dispatch".to_string(),
            per_page: 5,
        }
    }
}

/// Body of a repository contents response, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// JSON envelope with an encoded `content` field.
    Encoded {
        content: Option<String>,
        encoding: Option<String>,
        sha: Option<String>,
    },
    /// The endpoint answered with the file body itself.
    Raw(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: Option<String>,
    pub head_branch: String,
    pub base_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePullRequest {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
}
