use std::path::PathBuf;

use serde::Serialize;

use crate::error::AppError;
use crate::platform::types::{PullRequest, RunConclusion};

/// States of a remediation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationState {
    Idle,
    Triggered,
    Polling,
    Succeeded,
    Failed,
    Correcting,
    Publishing,
    Done,
    Aborted,
}

/// How an attempt ended.
#[derive(Debug)]
pub enum RemediationOutcome {
    /// The run did not fail; nothing to fix.
    NoFixNeeded { conclusion: Option<RunConclusion> },
    /// A corrected workflow was proposed in a pull request.
    FixProposed { pull_request: PullRequest },
    /// The attempt stopped at a failed stage.
    Aborted { error: AppError },
}

impl RemediationOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RemediationOutcome::NoFixNeeded { .. } => 0,
            RemediationOutcome::FixProposed { .. } => 2,
            RemediationOutcome::Aborted { error } => error.exit_code(),
        }
    }
}

/// Result of one remediation attempt, with the artifacts it left behind.
#[derive(Debug)]
pub struct RemediationReport {
    /// Every state entered, starting with `Idle`.
    pub states: Vec<RemediationState>,
    pub run_id: Option<u64>,
    pub conclusion: Option<RunConclusion>,
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_sha256: Option<String>,
    pub corrected_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub outcome: RemediationOutcome,
}

impl RemediationReport {
    pub fn final_state(&self) -> RemediationState {
        self.states
            .last()
            .copied()
            .unwrap_or(RemediationState::Idle)
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }

    pub fn error(&self) -> Option<&AppError> {
        match &self.outcome {
            RemediationOutcome::Aborted { error } => Some(error),
            _ => None,
        }
    }

    pub fn pull_request(&self) -> Option<&PullRequest> {
        match &self.outcome {
            RemediationOutcome::FixProposed { pull_request } => Some(pull_request),
            _ => None,
        }
    }
}
