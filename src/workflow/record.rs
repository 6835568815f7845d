use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::workflow::types::{RemediationReport, RemediationState};

pub const RECORD_FILE_NAME: &str = "remediation_report.toml";

/// Audit record of one attempt, written next to the configuration backups.
#[derive(Debug, Serialize)]
pub struct AttemptRecord {
    pub repository: String,
    pub workflow_path: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: RemediationState,
    pub exit_code: u8,
    pub states: Vec<RemediationState>,
    pub run_id: Option<u64>,
    pub conclusion: Option<String>,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_sha256: Option<String>,
    pub corrected_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub pull_request_number: Option<u64>,
    pub pull_request_url: Option<String>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn from_report(
        repository: &str,
        workflow_path: &str,
        started_at: DateTime<Utc>,
        report: &RemediationReport,
    ) -> Self {
        let pull_request = report.pull_request();
        let error = report.error();
        Self {
            repository: repository.to_string(),
            workflow_path: workflow_path.to_string(),
            started_at,
            finished_at: Utc::now(),
            final_state: report.final_state(),
            exit_code: report.exit_code(),
            states: report.states.clone(),
            run_id: report.run_id,
            conclusion: report.conclusion.map(|c| c.to_string()),
            snapshot_path: report.snapshot_path.clone(),
            snapshot_sha256: report.snapshot_sha256.clone(),
            corrected_path: report.corrected_path.clone(),
            branch: report.branch.clone(),
            pull_request_number: pull_request.map(|pr| pr.number),
            pull_request_url: pull_request.and_then(|pr| pr.html_url.clone()),
            error_kind: error.map(|e| e.kind().to_string()),
            error: error.map(|e| e.to_string()),
        }
    }

    pub async fn write(&self, backup_dir: &Path) -> Result<PathBuf> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode attempt record: {e}")))?;
        tokio::fs::create_dir_all(backup_dir).await?;
        let path = backup_dir.join(RECORD_FILE_NAME);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }
}
