use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::config::PollingConfig;
use crate::error::{AppError, Result};
use crate::platform::types::{RunConclusion, RunFilter, WorkflowRun};
use crate::platform::CiPlatform;
use crate::shutdown::CancelSignal;

/// Provider timestamps have one-second resolution.
const CREATED_AT_TOLERANCE_SECS: i64 = 5;

/// Resolves the run a dispatch started and waits for it to finish.
pub struct RunObserver {
    platform: Arc<dyn CiPlatform>,
    filter: RunFilter,
    interval: Duration,
    timeout: Option<Duration>,
    resolve_attempts: u32,
}

impl RunObserver {
    pub fn new(platform: Arc<dyn CiPlatform>, filter: RunFilter, polling: &PollingConfig) -> Self {
        Self {
            platform,
            filter,
            interval: polling.interval(),
            timeout: polling.timeout(),
            resolve_attempts: polling.resolve_attempts.max(1),
        }
    }

    /// The most recently created run visible to us, if any.
    pub async fn latest_run(&self) -> Result<Option<WorkflowRun>> {
        let runs = self.platform.list_workflow_runs(&self.filter).await?;
        Ok(runs.into_iter().next())
    }

    /// Find the run started by a dispatch issued at `since`.
    ///
    /// Dispatched runs take a moment to show up in the listing, so this looks
    /// a few times for a run created after the dispatch before settling for
    /// whatever is most recent.
    pub async fn resolve_dispatched_run(
        &self,
        since: DateTime<Utc>,
        cancel: &CancelSignal,
    ) -> Result<Option<WorkflowRun>> {
        let mut latest = None;

        for attempt in 1..=self.resolve_attempts {
            latest = self.latest_run().await?;

            if let Some(run) = &latest {
                if created_since(run, since) {
                    tracing::info!(run_id = run.id, attempt, "Resolved dispatched run");
                    return Ok(latest);
                }
            }

            if attempt < self.resolve_attempts {
                tracing::debug!(attempt, "Dispatched run not listed yet");
                self.pause(self.interval, cancel).await?;
            }
        }

        if let Some(run) = &latest {
            tracing::warn!(
                run_id = run.id,
                created_at = ?run.created_at,
                "No run created after the dispatch was listed; using the most recent run"
            );
        }
        Ok(latest)
    }

    /// Poll `run` until it completes and return its conclusion.
    ///
    /// Failed status queries are logged and retried on the next tick. The
    /// loop ends early only on cancellation or when the configured deadline
    /// passes.
    pub async fn await_completion(
        &self,
        run: &WorkflowRun,
        cancel: &CancelSignal,
    ) -> Result<Option<RunConclusion>> {
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            polls += 1;
            match self.platform.get_workflow_run(run.id).await {
                Ok(current) => {
                    tracing::info!(
                        run_id = run.id,
                        status = ?current.status,
                        conclusion = ?current.conclusion,
                        poll = polls,
                        "Workflow status"
                    );
                    if current.is_completed() {
                        return Ok(current.conclusion);
                    }
                }
                Err(e) => {
                    tracing::warn!(run_id = run.id, poll = polls, error = %e, "Failed to get workflow status");
                }
            }

            let mut wait = self.interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(AppError::DeadlineExceeded {
                        run_id: run.id,
                        waited_secs: now.duration_since(started).as_secs(),
                    });
                }
                wait = wait.min(deadline - now);
            }

            self.pause(wait, cancel).await?;
        }
    }

    async fn pause(&self, wait: Duration, cancel: &CancelSignal) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = cancel.cancelled() => Err(AppError::Cancelled),
        }
    }
}

fn created_since(run: &WorkflowRun, since: DateTime<Utc>) -> bool {
    run.created_at.map_or(true, |created| {
        created >= since - chrono::Duration::seconds(CREATED_AT_TOLERANCE_SECS)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::{CreatePullRequest, FileContent, PullRequest, RunStatus};
    use crate::shutdown::cancel_pair;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves scripted run listings and status observations.
    #[derive(Default)]
    struct ScriptedRuns {
        listings: Mutex<VecDeque<Vec<WorkflowRun>>>,
        observations: Mutex<VecDeque<Result<WorkflowRun>>>,
        status_queries: Mutex<u32>,
    }

    #[async_trait]
    impl CiPlatform for ScriptedRuns {
        async fn dispatch_workflow(&self, _: &str, _: &str) -> Result<()> {
            unreachable!("observer never dispatches")
        }

        async fn list_workflow_runs(&self, _: &RunFilter) -> Result<Vec<WorkflowRun>> {
            let mut listings = self.listings.lock().unwrap();
            if listings.len() > 1 {
                Ok(listings.pop_front().unwrap())
            } else {
                Ok(listings.front().cloned().unwrap_or_default())
            }
        }

        async fn get_workflow_run(&self, _: u64) -> Result<WorkflowRun> {
            *self.status_queries.lock().unwrap() += 1;
            self.observations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(run(1, RunStatus::InProgress, None)))
        }

        async fn get_file_content(&self, _: &str, _: &str) -> Result<FileContent> {
            unreachable!()
        }

        async fn create_pull_request(&self, _: &CreatePullRequest) -> Result<PullRequest> {
            unreachable!()
        }
    }

    fn run(id: u64, status: RunStatus, conclusion: Option<RunConclusion>) -> WorkflowRun {
        WorkflowRun {
            id,
            status,
            conclusion,
            head_branch: Some("main".to_string()),
            created_at: None,
            html_url: None,
        }
    }

    fn observer(platform: Arc<ScriptedRuns>, timeout_secs: u64) -> RunObserver {
        let polling = PollingConfig {
            interval_secs: 10,
            timeout_secs,
            resolve_attempts: 3,
        };
        RunObserver::new(platform, RunFilter::dispatched("ci.yml", "main"), &polling)
    }

    #[tokio::test]
    async fn test_latest_run_is_first_listed() {
        let platform = Arc::new(ScriptedRuns::default());
        platform.listings.lock().unwrap().push_back(vec![
            run(30, RunStatus::Queued, None),
            run(20, RunStatus::Completed, Some(RunConclusion::Success)),
        ]);
        let latest = observer(Arc::clone(&platform), 0).latest_run().await.unwrap();
        assert_eq!(latest.unwrap().id, 30);
    }

    #[tokio::test]
    async fn test_latest_run_none_when_empty() {
        let platform = Arc::new(ScriptedRuns::default());
        assert!(observer(platform, 0).latest_run().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_completion_through_transient_errors() {
        let platform = Arc::new(ScriptedRuns::default());
        platform.observations.lock().unwrap().extend([
            Ok(run(5, RunStatus::Queued, None)),
            Err(AppError::StatusQueryFailed {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Ok(run(5, RunStatus::InProgress, None)),
            Ok(run(5, RunStatus::Completed, Some(RunConclusion::StartupFailure))),
            Ok(run(5, RunStatus::Completed, Some(RunConclusion::Success))),
        ]);

        let started = Instant::now();
        let conclusion = observer(Arc::clone(&platform), 0)
            .await_completion(&run(5, RunStatus::Queued, None), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(conclusion, Some(RunConclusion::StartupFailure));
        assert_eq!(*platform.status_queries.lock().unwrap(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let platform = Arc::new(ScriptedRuns::default());
        let err = observer(Arc::clone(&platform), 25)
            .await_completion(&run(8, RunStatus::Queued, None), &CancelSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DeadlineExceeded { run_id: 8, waited_secs: 25 }));
        // Polls at 0s, 10s, 20s and a final one at the 25s deadline.
        assert_eq!(*platform.status_queries.lock().unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let platform = Arc::new(ScriptedRuns::default());
        let (handle, signal) = cancel_pair();
        let watched = observer(Arc::clone(&platform), 0);

        let waiting = tokio::spawn(async move {
            watched
                .await_completion(&run(2, RunStatus::Queued, None), &signal)
                .await
        });
        tokio::time::sleep(Duration::from_secs(15)).await;
        handle.cancel();

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(*platform.status_queries.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_waits_for_run_created_after_dispatch() {
        let dispatched_at = Utc::now();
        let mut stale = run(1, RunStatus::Completed, Some(RunConclusion::Success));
        stale.created_at = Some(dispatched_at - chrono::Duration::minutes(30));
        let mut fresh = run(2, RunStatus::Queued, None);
        fresh.created_at = Some(dispatched_at + chrono::Duration::seconds(2));

        let platform = Arc::new(ScriptedRuns::default());
        platform
            .listings
            .lock()
            .unwrap()
            .extend([vec![stale.clone()], vec![fresh, stale]]);

        let resolved = observer(platform, 0)
            .resolve_dispatched_run(dispatched_at, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(resolved.unwrap().id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_falls_back_to_latest() {
        let dispatched_at = Utc::now();
        let mut stale = run(1, RunStatus::Completed, Some(RunConclusion::Success));
        stale.created_at = Some(dispatched_at - chrono::Duration::minutes(30));

        let platform = Arc::new(ScriptedRuns::default());
        platform.listings.lock().unwrap().push_back(vec![stale]);

        let resolved = observer(platform, 0)
            .resolve_dispatched_run(dispatched_at, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(resolved.unwrap().id, 1);
    }
}
