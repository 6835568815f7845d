#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use actions_medic::config::AppConfig;
use actions_medic::correction::client::ChatRequest;
use actions_medic::correction::ChatBackend;
use actions_medic::error::{AppError, Result};
use actions_medic::platform::types::{
    CreatePullRequest, FileContent, PullRequest, RunConclusion, RunFilter, RunStatus, WorkflowRun,
};
use actions_medic::platform::CiPlatform;
use actions_medic::publish::PublishStep;
use actions_medic::shutdown::CancelHandle;
use actions_medic::workspace::Vcs;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Configuration pointing at `api` and `llm`, with all local state under `dir`.
pub fn test_config(api: &str, llm: &str, dir: &Path) -> AppConfig {
    let toml = format!(
        r#"
[github]
api_base_url = "{api}"
owner = "octo"
repo = "demo"
token = "t0ken"
workflow_path = ".github/workflows/ci.yml"

[llm]
endpoint = "{llm}"

[polling]
interval_secs = 10
timeout_secs = 0
resolve_attempts = 2

[workspace]
backup_dir = "{backup}"
clone_dir = "{clones}"
"#,
        backup = dir.join("backups").display(),
        clones = dir.join("clones").display(),
    );
    AppConfig::from_toml_str(&toml).unwrap()
}

pub fn run(id: u64, status: RunStatus, conclusion: Option<RunConclusion>) -> WorkflowRun {
    WorkflowRun {
        id,
        status,
        conclusion,
        head_branch: Some("main".to_string()),
        created_at: None,
        html_url: Some(format!("https://github.com/octo/demo/actions/runs/{id}")),
    }
}

/// In-memory CI provider that plays back a scripted attempt and logs calls.
pub struct ScriptedPlatform {
    pub dispatch_status: u16,
    pub content: FileContent,
    pub listing: Vec<WorkflowRun>,
    pub observations: Mutex<VecDeque<WorkflowRun>>,
    pub pr_status: u16,
    pub calls: Mutex<Vec<&'static str>>,
    pub pull_requests: Mutex<Vec<CreatePullRequest>>,
}

impl ScriptedPlatform {
    /// A run that is in progress twice and then concludes with `conclusion`.
    pub fn concluding(conclusion: Option<RunConclusion>) -> Self {
        Self {
            dispatch_status: 204,
            content: FileContent::Encoded {
                content: Some("a2V5OiB2YWx1ZQ==".to_string()),
                encoding: Some("base64".to_string()),
                sha: None,
            },
            listing: vec![run(42, RunStatus::Queued, None)],
            observations: Mutex::new(VecDeque::from([
                run(42, RunStatus::InProgress, None),
                run(42, RunStatus::InProgress, None),
                run(42, RunStatus::Completed, conclusion),
            ])),
            pr_status: 201,
            calls: Mutex::new(Vec::new()),
            pull_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CiPlatform for ScriptedPlatform {
    async fn dispatch_workflow(&self, _workflow_id: &str, _git_ref: &str) -> Result<()> {
        self.log("dispatch");
        if self.dispatch_status != 204 {
            return Err(AppError::TriggerRejected {
                status: self.dispatch_status,
                body: "Resource not accessible by integration".to_string(),
            });
        }
        Ok(())
    }

    async fn list_workflow_runs(&self, _filter: &RunFilter) -> Result<Vec<WorkflowRun>> {
        self.log("list_runs");
        Ok(self.listing.clone())
    }

    async fn get_workflow_run(&self, run_id: u64) -> Result<WorkflowRun> {
        self.log("get_run");
        let mut observations = self.observations.lock().unwrap();
        let next = if observations.len() > 1 {
            observations.pop_front()
        } else {
            observations.front().cloned()
        };
        Ok(next.unwrap_or_else(|| run(run_id, RunStatus::InProgress, None)))
    }

    async fn get_file_content(&self, _path: &str, _git_ref: &str) -> Result<FileContent> {
        self.log("get_content");
        Ok(self.content.clone())
    }

    async fn create_pull_request(&self, pr: &CreatePullRequest) -> Result<PullRequest> {
        self.log("create_pr");
        self.pull_requests.lock().unwrap().push(pr.clone());
        if self.pr_status != 201 {
            return Err(AppError::PublishStepFailed {
                step: PublishStep::PullRequest,
                reason: format!("GitHub returned {}", self.pr_status),
            });
        }
        Ok(PullRequest {
            number: 7,
            title: pr.title.clone(),
            html_url: Some("https://github.com/octo/demo/pull/7".to_string()),
            head_branch: pr.head_branch.clone(),
            base_branch: pr.base_branch.clone(),
        })
    }
}

/// Chat backend answering every request with the same body.
pub struct CannedChat {
    pub reply: serde_json::Value,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl CannedChat {
    pub fn new(reply: serde_json::Value) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(content: &str) -> Self {
        Self::new(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for CannedChat {
    async fn complete(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

/// Chat backend that requests cancellation while answering.
pub struct CancellingChat {
    pub inner: CannedChat,
    pub handle: Mutex<Option<CancelHandle>>,
}

impl CancellingChat {
    pub fn new(inner: CannedChat, handle: CancelHandle) -> Self {
        Self {
            inner,
            handle: Mutex::new(Some(handle)),
        }
    }
}

#[async_trait]
impl ChatBackend for CancellingChat {
    async fn complete(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.cancel();
        }
        self.inner.complete(request).await
    }
}

/// Version control that records operations instead of talking to a remote.
///
/// `stage_file` captures the file as written so tests can check what would
/// have been committed.
#[derive(Default)]
pub struct RecordingVcs {
    pub ops: Mutex<Vec<String>>,
    pub staged: Mutex<Vec<(String, String)>>,
    pub fail_on: Option<&'static str>,
    /// Fires the handle while performing the named operation.
    pub cancel_during: Mutex<Option<(&'static str, CancelHandle)>>,
}

impl RecordingVcs {
    pub fn failing_on(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::default()
        }
    }

    pub fn cancelling_during(op: &'static str, handle: CancelHandle) -> Self {
        Self {
            cancel_during: Mutex::new(Some((op, handle))),
            ..Self::default()
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, detail: String) -> Result<()> {
        self.ops.lock().unwrap().push(format!("{op} {detail}"));
        let mut cancel_during = self.cancel_during.lock().unwrap();
        if matches!(cancel_during.as_ref(), Some((target, _)) if *target == op) {
            if let Some((_, handle)) = cancel_during.take() {
                handle.cancel();
            }
        }
        if self.fail_on == Some(op) {
            return Err(AppError::Git(format!("{op} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn clone_repo(&self, url: &str, target: &Path, _token: &str) -> Result<()> {
        self.record("clone", url.to_string())?;
        std::fs::create_dir_all(target)?;
        Ok(())
    }

    async fn create_branch(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("branch", branch.to_string())
    }

    async fn stage_file(&self, dir: &Path, relative_path: &Path) -> Result<()> {
        self.record("stage", relative_path.display().to_string())?;
        let contents = std::fs::read_to_string(dir.join(relative_path))?;
        self.staged
            .lock()
            .unwrap()
            .push((relative_path.display().to_string(), contents));
        Ok(())
    }

    async fn commit(&self, _dir: &Path, message: &str) -> Result<String> {
        self.record("commit", message.to_string())?;
        Ok("0123abcd".to_string())
    }

    async fn push(&self, _dir: &Path, branch: &str, _token: &str) -> Result<()> {
        self.record("push", branch.to_string())
    }
}
