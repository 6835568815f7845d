use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    pub owner: String,
    pub repo: String,
    pub token: String,
    /// Path of the workflow file inside the repository, e.g. `.github/workflows/ci.yml`.
    pub workflow_path: String,
    /// Branch the workflow is dispatched on and the snapshot is read from.
    #[serde(default = "default_branch")]
    pub git_ref: String,
    /// Branch the fix pull request targets.
    #[serde(default = "default_branch")]
    pub base_branch: String,
    /// Override for the HTTPS clone URL (GitHub Enterprise).
    #[serde(default)]
    pub clone_url: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base_url", &self.api_base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"[REDACTED]")
            .field("workflow_path", &self.workflow_path)
            .field("git_ref", &self.git_ref)
            .field("base_branch", &self.base_branch)
            .field("clone_url", &self.clone_url)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    /// Base URL of the chat-completion server; `/v1/chat/completions` is appended.
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Upper bound on waiting for a run to complete; 0 waits indefinitely.
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
    /// How many times to look for a run created after the dispatch.
    #[serde(default = "default_resolve_attempts")]
    pub resolve_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_clone_dir")]
    pub clone_dir: PathBuf,
    #[serde(default)]
    pub keep_clone: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublishConfig {
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default = "default_pr_title")]
    pub pr_title: String,
    #[serde(default = "default_pr_body")]
    pub pr_body: String,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
    #[serde(default)]
    pub force_push: bool,
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_timeout() -> u64 {
    60 * 60
}

fn default_resolve_attempts() -> u32 {
    3
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_clone_dir() -> PathBuf {
    PathBuf::from("/tmp/actions-medic-workspaces")
}

fn default_branch_prefix() -> String {
    "actions-medic/fix".to_string()
}

fn default_commit_message() -> String {
    "fix: auto-generated workflow patch".to_string()
}

fn default_pr_title() -> String {
    "AI-generated workflow fix".to_string()
}

fn default_pr_body() -> String {
    "This PR patches the workflow using an LLM-generated correction.\n\n\
     The change has not been validated; review it before merging."
        .to_string()
}

fn default_author_name() -> String {
    "Actions Medic".to_string()
}

fn default_author_email() -> String {
    "actions-medic@users.noreply.github.com".to_string()
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_poll_timeout(),
            resolve_attempts: default_resolve_attempts(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            clone_dir: default_clone_dir(),
            keep_clone: false,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            branch_prefix: default_branch_prefix(),
            commit_message: default_commit_message(),
            pr_title: default_pr_title(),
            pr_body: default_pr_body(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            force_push: false,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("actions-medic").required(false));
        }

        // Environment variable overrides with ACTIONS_MEDIC prefix
        builder = builder.add_source(
            config::Environment::with_prefix("ACTIONS_MEDIC")
                .separator("__")
                .try_parsing(true),
        );

        Self::build(builder)
    }

    /// Parse a configuration from TOML text, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("github.owner", &self.github.owner),
            ("github.repo", &self.github.repo),
            ("github.token", &self.github.token),
            ("github.workflow_path", &self.github.workflow_path),
            ("llm.endpoint", &self.llm.endpoint),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{name} must not be empty")));
            }
        }

        if self.polling.interval_secs == 0 {
            return Err(AppError::Config(
                "polling.interval_secs must be at least 1".to_string(),
            ));
        }

        for (name, branch) in [
            ("github.git_ref", &self.github.git_ref),
            ("github.base_branch", &self.github.base_branch),
            ("publish.branch_prefix", &self.publish.branch_prefix),
        ] {
            if branch.is_empty() || branch.starts_with('-') {
                return Err(AppError::Config(format!(
                    "{name} is not a usable branch name: {branch:?}"
                )));
            }
        }

        Ok(())
    }

    /// Identifier the dispatch API expects: the workflow file's base name.
    pub fn workflow_id(&self) -> &str {
        file_name_of(&self.github.workflow_path)
    }

    pub fn repo_full_name(&self) -> String {
        format!("{}/{}", self.github.owner, self.github.repo)
    }

    pub fn clone_url(&self) -> String {
        self.github.clone_url.clone().unwrap_or_else(|| {
            format!(
                "https://github.com/{}/{}.git",
                self.github.owner, self.github.repo
            )
        })
    }
}

/// Last component of a slash-separated repository path.
pub fn file_name_of(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}
