use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::platform::types::{FileContent, PullRequest, WorkflowRun};

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct ContentEnvelope {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestBody {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    head: BranchRef,
    base: BranchRef,
}

/// Map a list-runs response body, preserving the provider's ordering.
pub fn map_run_list(body: &str) -> Result<Vec<WorkflowRun>> {
    let list: RunList = serde_json::from_str(body)?;
    Ok(list.workflow_runs)
}

pub fn map_run(body: &str) -> Result<WorkflowRun> {
    Ok(serde_json::from_str(body)?)
}

/// Map a contents response body.
///
/// A JSON object is the usual envelope; a body that is not JSON at all is the
/// raw file, which some proxies and raw media types return.
pub fn map_file_content(body: &str) -> Result<FileContent> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => {
            let envelope: ContentEnvelope =
                serde_json::from_value(serde_json::Value::Object(map))?;
            Ok(FileContent::Encoded {
                content: envelope.content,
                encoding: envelope.encoding,
                sha: envelope.sha,
            })
        }
        Ok(serde_json::Value::Array(_)) => Err(AppError::SnapshotFetchFailed(
            "path refers to a directory, not a file".to_string(),
        )),
        _ if body.trim().is_empty() => Err(AppError::SnapshotFetchFailed(
            "response body is empty".to_string(),
        )),
        _ => Ok(FileContent::Raw(body.to_string())),
    }
}

pub fn map_pull_request(body: &str) -> Result<PullRequest> {
    let pr: PullRequestBody = serde_json::from_str(body)?;
    Ok(PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        html_url: pr.html_url,
        head_branch: pr.head.name,
        base_branch: pr.base.name,
    })
}
