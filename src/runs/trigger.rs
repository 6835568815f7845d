use std::sync::Arc;

use crate::error::Result;
use crate::platform::CiPlatform;

/// Starts workflow runs through the platform's dispatch endpoint.
///
/// A dispatch is never retried: repeating it could start several runs.
pub struct RunTrigger {
    platform: Arc<dyn CiPlatform>,
}

impl RunTrigger {
    pub fn new(platform: Arc<dyn CiPlatform>) -> Self {
        Self { platform }
    }

    pub async fn trigger(&self, workflow_id: &str, branch: &str) -> Result<()> {
        match self.platform.dispatch_workflow(workflow_id, branch).await {
            Ok(()) => {
                tracing::info!(workflow = workflow_id, branch, "Workflow triggered");
                Ok(())
            }
            Err(e) => {
                tracing::error!(workflow = workflow_id, branch, error = %e, "Failed to trigger workflow");
                Err(e)
            }
        }
    }
}
