use async_trait::async_trait;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::Serialize;

use crate::config::GitHubConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::CiPlatform;
use crate::publish::PublishStep;

use super::mapper;

/// GitHub REST client bound to a single repository.
///
/// Requests go through octocrab's raw `_get`/`_post` so the status code is
/// available to the caller; the remediation flow branches on exact codes.
/// Retries are off: a resent dispatch can start a second run.
pub struct GitHubPlatform {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Octocrab::builder()
            .base_uri(config.api_base_url.as_str())
            .map_err(|e| AppError::Config(format!("Invalid GitHub API base URL: {e}")))?
            .personal_token(config.token.clone())
            .add_retry_config(RetryConfig::None)
            .build()
            .map_err(|e| AppError::GitHubApi(format!("Failed to build octocrab client: {e}")))?;

        Ok(Self {
            client,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
        })
    }

    fn repo_route(&self, rest: &str) -> String {
        format!(
            "/repos/{}/{}/{rest}",
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo)
        )
    }

    async fn get_text(&self, route: &str) -> Result<(u16, String)> {
        let response = self.client._get(route).await?;
        let status = response.status().as_u16();
        let body = self.client.body_to_string(response).await?;
        Ok((status, body))
    }

    async fn post_text<B: Serialize + Sync>(&self, route: &str, body: &B) -> Result<(u16, String)> {
        let response = self.client._post(route, Some(body)).await?;
        let status = response.status().as_u16();
        let body = self.client.body_to_string(response).await?;
        Ok((status, body))
    }
}

/// Encode each segment of a repository path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl CiPlatform for GitHubPlatform {
    async fn dispatch_workflow(&self, workflow_id: &str, git_ref: &str) -> Result<()> {
        let route = self.repo_route(&format!(
            "actions/workflows/{}/dispatches",
            urlencoding::encode(workflow_id)
        ));
        let payload = serde_json::json!({ "ref": git_ref });

        let (status, body) = self.post_text(&route, &payload).await?;
        if status != 204 {
            return Err(AppError::TriggerRejected { status, body });
        }
        Ok(())
    }

    async fn list_workflow_runs(&self, filter: &RunFilter) -> Result<Vec<WorkflowRun>> {
        let route = self.repo_route(&format!(
            "actions/workflows/{}/runs?branch={}&event={}&per_page={}",
            urlencoding::encode(&filter.workflow_id),
            urlencoding::encode(&filter.branch),
            urlencoding::encode(&filter.event),
            filter.per_page
        ));

        let (status, body) = self.get_text(&route).await?;
        if status != 200 {
            return Err(AppError::GitHubApi(format!(
                "Failed to list workflow runs ({status}): {body}"
            )));
        }
        mapper::map_run_list(&body)
    }

    async fn get_workflow_run(&self, run_id: u64) -> Result<WorkflowRun> {
        let route = self.repo_route(&format!("actions/runs/{run_id}"));

        let (status, body) = self.get_text(&route).await?;
        if status != 200 {
            return Err(AppError::StatusQueryFailed { status, body });
        }
        mapper::map_run(&body).map_err(|e| AppError::StatusQueryFailed {
            status,
            body: format!("unreadable run payload: {e}"),
        })
    }

    async fn get_file_content(&self, path: &str, git_ref: &str) -> Result<FileContent> {
        let route = self.repo_route(&format!(
            "contents/{}?ref={}",
            encode_path(path),
            urlencoding::encode(git_ref)
        ));

        let (status, body) = self
            .get_text(&route)
            .await
            .map_err(|e| AppError::SnapshotFetchFailed(e.to_string()))?;
        if status != 200 {
            return Err(AppError::SnapshotFetchFailed(format!(
                "GitHub returned {status} for {path}@{git_ref}: {body}"
            )));
        }
        mapper::map_file_content(&body)
    }

    async fn create_pull_request(&self, pr: &CreatePullRequest) -> Result<PullRequest> {
        let route = self.repo_route("pulls");
        let payload = serde_json::json!({
            "title": pr.title,
            "body": pr.body,
            "head": pr.head_branch,
            "base": pr.base_branch,
        });

        let (status, body) = self
            .post_text(&route, &payload)
            .await
            .map_err(|e| AppError::PublishStepFailed {
                step: PublishStep::PullRequest,
                reason: e.to_string(),
            })?;
        if status != 201 {
            return Err(AppError::PublishStepFailed {
                step: PublishStep::PullRequest,
                reason: format!("GitHub returned {status}: {body}"),
            });
        }
        mapper::map_pull_request(&body).map_err(|e| AppError::PublishStepFailed {
            step: PublishStep::PullRequest,
            reason: format!("unreadable pull request payload: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(
            encode_path(".github/workflows/Hello World.yml"),
            ".github/workflows/Hello%20World.yml"
        );
        assert_eq!(encode_path("/ci.yml"), "ci.yml");
    }
}
