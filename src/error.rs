use thiserror::Error;

use crate::publish::PublishStep;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow dispatch rejected with status {status}: {body}")]
    TriggerRejected { status: u16, body: String },

    #[error("No workflow run found: {0}")]
    RunNotFound(String),

    #[error("Run status query failed with status {status}: {body}")]
    StatusQueryFailed { status: u16, body: String },

    #[error("Failed to capture configuration snapshot: {0}")]
    SnapshotFetchFailed(String),

    #[error("Correction request failed with status {status}: {body}")]
    CorrectionRequestFailed { status: u16, body: String },

    #[error("Malformed correction response: {0}")]
    CorrectionMalformed(String),

    #[error("Publish step '{step}' failed: {reason}")]
    PublishStepFailed { step: PublishStep, reason: String },

    #[error("Run {run_id} did not complete within {waited_secs}s")]
    DeadlineExceeded { run_id: u64, waited_secs: u64 },

    #[error("Remediation cancelled")]
    Cancelled,

    #[error("Another remediation attempt holds the lock at {0}")]
    AttemptInProgress(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Git operation failed: {0}")]
    Git(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Process exit code reported when an attempt aborts with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::TriggerRejected { .. } => 3,
            AppError::RunNotFound(_) => 4,
            AppError::SnapshotFetchFailed(_) => 5,
            AppError::CorrectionRequestFailed { .. } | AppError::CorrectionMalformed(_) => 6,
            AppError::PublishStepFailed { .. } => 7,
            AppError::DeadlineExceeded { .. } => 8,
            AppError::AttemptInProgress(_) => 9,
            AppError::Config(_) => 78,
            AppError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Short stable name of the error kind, used in logs and attempt records.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::TriggerRejected { .. } => "trigger_rejected",
            AppError::RunNotFound(_) => "run_not_found",
            AppError::StatusQueryFailed { .. } => "status_query_failed",
            AppError::SnapshotFetchFailed(_) => "snapshot_fetch_failed",
            AppError::CorrectionRequestFailed { .. } => "correction_request_failed",
            AppError::CorrectionMalformed(_) => "correction_malformed",
            AppError::PublishStepFailed { .. } => "publish_step_failed",
            AppError::DeadlineExceeded { .. } => "deadline_exceeded",
            AppError::Cancelled => "cancelled",
            AppError::AttemptInProgress(_) => "attempt_in_progress",
            AppError::GitHubApi(_) => "github_api",
            AppError::Git(_) => "git",
            AppError::Workspace(_) => "workspace",
            AppError::Serialization(_) => "serialization",
            AppError::Http(_) => "http",
            AppError::Io(_) => "io",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<octocrab::Error> for AppError {
    fn from(e: octocrab::Error) -> Self {
        AppError::GitHubApi(e.to_string())
    }
}

impl From<git2::Error> for AppError {
    fn from(e: git2::Error) -> Self {
        AppError::Git(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
