use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::AppConfig;
use crate::correction::{ChatBackend, ChatClient, CorrectionEngine};
use crate::document::{ConfigDocument, SourceLocation};
use crate::error::{AppError, Result};
use crate::platform::github::GitHubPlatform;
use crate::platform::types::{RunConclusion, RunFilter};
use crate::platform::CiPlatform;
use crate::publish::{remediation_branch, ChangeProposal, ChangePublisher, RepoRef};
use crate::runs::{RunObserver, RunTrigger};
use crate::shutdown::CancelSignal;
use crate::snapshot::{read_backup, ConfigSnapshot};
use crate::workflow::record::AttemptRecord;
use crate::workflow::types::{RemediationOutcome, RemediationReport, RemediationState};
use crate::workspace::{AttemptLock, Git2Vcs, Vcs, WorkspaceManager};

/// Drives one remediation attempt: trigger, snapshot, observe and, when the
/// run failed, correct and publish.
pub struct Orchestrator {
    config: AppConfig,
    trigger: RunTrigger,
    snapshot: ConfigSnapshot,
    observer: RunObserver,
    engine: CorrectionEngine,
    publisher: ChangePublisher,
}

/// Progress collected while an attempt runs.
#[derive(Default)]
struct Progress {
    states: Vec<RemediationState>,
    run_id: Option<u64>,
    conclusion: Option<RunConclusion>,
    snapshot_path: Option<PathBuf>,
    snapshot_sha256: Option<String>,
    corrected_path: Option<PathBuf>,
    branch: Option<String>,
}

impl Progress {
    fn enter(&mut self, state: RemediationState) {
        tracing::info!(state = ?state, "Remediation state");
        self.states.push(state);
    }

    fn finish(self, outcome: RemediationOutcome) -> RemediationReport {
        RemediationReport {
            states: self.states,
            run_id: self.run_id,
            conclusion: self.conclusion,
            snapshot_path: self.snapshot_path,
            snapshot_sha256: self.snapshot_sha256,
            corrected_path: self.corrected_path,
            branch: self.branch,
            outcome,
        }
    }
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        platform: Arc<dyn CiPlatform>,
        backend: Arc<dyn ChatBackend>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        let filter = RunFilter::dispatched(config.workflow_id(), &config.github.git_ref);
        Self {
            trigger: RunTrigger::new(Arc::clone(&platform)),
            snapshot: ConfigSnapshot::new(Arc::clone(&platform), &config.workspace.backup_dir),
            observer: RunObserver::new(Arc::clone(&platform), filter, &config.polling),
            engine: CorrectionEngine::new(backend, &config.llm),
            publisher: ChangePublisher::new(
                platform,
                vcs,
                WorkspaceManager::new(&config.workspace),
            ),
            config,
        }
    }

    /// Wire the GitHub, chat and git2 implementations from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let platform: Arc<dyn CiPlatform> = Arc::new(GitHubPlatform::new(&config.github)?);
        let backend: Arc<dyn ChatBackend> = Arc::new(ChatClient::new(&config.llm)?);
        let vcs: Arc<dyn Vcs> = Arc::new(Git2Vcs::new(
            &config.publish.author_name,
            &config.publish.author_email,
            config.publish.force_push,
        ));
        Ok(Self::new(config, platform, backend, vcs))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn source(&self) -> SourceLocation {
        SourceLocation {
            owner: self.config.github.owner.clone(),
            repo: self.config.github.repo.clone(),
            path: self.config.github.workflow_path.clone(),
            branch: self.config.github.git_ref.clone(),
        }
    }

    fn repo_ref(&self) -> RepoRef {
        RepoRef {
            full_name: self.config.repo_full_name(),
            clone_url: self.config.clone_url(),
            base_branch: self.config.github.base_branch.clone(),
        }
    }

    /// Run one attempt to completion. Never fails: errors end the attempt in
    /// `Aborted` and are carried in the report.
    pub async fn run(&self, cancel: &CancelSignal) -> RemediationReport {
        let started_at = Utc::now();
        let mut progress = Progress::default();
        progress.enter(RemediationState::Idle);

        let outcome = match self.drive(&mut progress, cancel).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(error = %error, kind = error.kind(), "Remediation aborted");
                progress.enter(RemediationState::Aborted);
                RemediationOutcome::Aborted { error }
            }
        };

        let report = progress.finish(outcome);
        let record = AttemptRecord::from_report(
            &self.config.repo_full_name(),
            &self.config.github.workflow_path,
            started_at,
            &report,
        );
        match record.write(&self.config.workspace.backup_dir).await {
            Ok(path) => tracing::debug!(path = %path.display(), "Attempt record written"),
            Err(e) => tracing::warn!(error = %e, "Failed to write attempt record"),
        }
        report
    }

    async fn drive(
        &self,
        progress: &mut Progress,
        cancel: &CancelSignal,
    ) -> Result<RemediationOutcome> {
        let workflow_id = self.config.workflow_id();
        let _lock = AttemptLock::acquire(
            &self.config.workspace.clone_dir,
            &self.config.repo_full_name(),
            workflow_id,
        )?;

        cancel.check()?;
        let dispatched_at = Utc::now();
        self.trigger
            .trigger(workflow_id, &self.config.github.git_ref)
            .await?;
        progress.enter(RemediationState::Triggered);

        let document = self.snapshot.fetch(&self.source()).await?;
        progress.snapshot_path = document.backup_path.clone();
        progress.snapshot_sha256 = Some(document.digest());

        let run = self
            .observer
            .resolve_dispatched_run(dispatched_at, cancel)
            .await?
            .ok_or_else(|| {
                AppError::RunNotFound(format!(
                    "no runs listed for workflow {workflow_id} on {}",
                    self.config.github.git_ref
                ))
            })?;
        progress.run_id = Some(run.id);
        progress.enter(RemediationState::Polling);

        let conclusion = self.observer.await_completion(&run, cancel).await?;
        progress.conclusion = conclusion;

        let failing = match conclusion {
            Some(conclusion) if conclusion.needs_remediation() => conclusion,
            _ => {
                tracing::info!(run_id = run.id, conclusion = ?conclusion, "Workflow did not fail; no fix needed");
                progress.enter(RemediationState::Succeeded);
                progress.enter(RemediationState::Done);
                return Ok(RemediationOutcome::NoFixNeeded { conclusion });
            }
        };
        tracing::warn!(run_id = run.id, conclusion = %failing, "Workflow failed");
        progress.enter(RemediationState::Failed);

        progress.enter(RemediationState::Correcting);
        let baseline = self.baseline_text(&document).await?;
        let corrected = cancel.guard(self.engine.correct(&baseline)).await?;
        cancel.check()?;
        progress.corrected_path = Some(self.snapshot.persist_corrected(&corrected).await?);

        progress.enter(RemediationState::Publishing);
        let branch = remediation_branch(&self.config.publish.branch_prefix, Utc::now());
        progress.branch = Some(branch.clone());
        let repo = self.repo_ref();
        let proposal = ChangeProposal::new(
            &self.config.publish,
            &repo,
            &self.config.github.workflow_path,
            &branch,
        )
        .with_run_details(&run, failing);

        let pull_request = self
            .publisher
            .publish(
                &corrected,
                &repo,
                &proposal,
                &self.config.github.token,
                cancel,
            )
            .await?;
        progress.enter(RemediationState::Done);

        Ok(RemediationOutcome::FixProposed { pull_request })
    }

    /// The correction is requested from the local backup so the model sees
    /// exactly what was captured before the fix.
    async fn baseline_text(&self, document: &ConfigDocument) -> Result<String> {
        match &document.backup_path {
            Some(path) => read_backup(path).await,
            None => Ok(document.text.clone()),
        }
    }

    /// Fetch and back up the workflow configuration without triggering it.
    pub async fn snapshot_only(&self) -> Result<ConfigDocument> {
        self.snapshot.fetch(&self.source()).await
    }
}
