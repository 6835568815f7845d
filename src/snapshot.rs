use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::file_name_of;
use crate::document::{ConfigDocument, SourceLocation};
use crate::error::{AppError, Result};
use crate::platform::CiPlatform;

pub const INITIAL_CONFIG_PREFIX: &str = "initial_config_";
pub const CORRECTED_FILE_NAME: &str = "corrected_workflow.yml";

/// Captures the pre-fix configuration and keeps local copies of both the
/// baseline and the correction.
pub struct ConfigSnapshot {
    platform: Arc<dyn CiPlatform>,
    backup_dir: PathBuf,
}

impl ConfigSnapshot {
    pub fn new(platform: Arc<dyn CiPlatform>, backup_dir: &Path) -> Self {
        Self {
            platform,
            backup_dir: backup_dir.to_path_buf(),
        }
    }

    /// Fetch, decode and back up the document at `source`.
    pub async fn fetch(&self, source: &SourceLocation) -> Result<ConfigDocument> {
        let content = self
            .platform
            .get_file_content(&source.path, &source.branch)
            .await?;

        let mut document = ConfigDocument::from_content(source.clone(), content)?;

        let backup_path = self.initial_path(&source.path);
        write_backup(&backup_path, &document.text)
            .await
            .map_err(|e| AppError::SnapshotFetchFailed(format!("failed to write backup: {e}")))?;

        tracing::info!(
            source = %source,
            path = %backup_path.display(),
            encoding = ?document.encoding,
            sha256 = %document.digest(),
            "Initial workflow config saved"
        );

        document.backup_path = Some(backup_path);
        Ok(document)
    }

    /// Write the corrected document next to the baseline.
    pub async fn persist_corrected(&self, text: &str) -> Result<PathBuf> {
        let path = self.backup_dir.join(CORRECTED_FILE_NAME);
        write_backup(&path, text).await?;
        tracing::info!(path = %path.display(), "Corrected workflow saved");
        Ok(path)
    }

    pub fn initial_path(&self, workflow_path: &str) -> PathBuf {
        self.backup_dir
            .join(format!("{INITIAL_CONFIG_PREFIX}{}", file_name_of(workflow_path)))
    }
}

async fn write_backup(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text.as_bytes()).await?;
    Ok(())
}

/// Read a backup written by [`ConfigSnapshot`].
pub async fn read_backup(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Workspace(format!("{} is not UTF-8: {e}", path.display())))
}
