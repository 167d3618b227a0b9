use std::path::Path;

use async_trait::async_trait;

use crate::error::JobCreationError;

/// Creates transcode jobs for detected files. Implemented by the host's job engine.
///
/// Returns `Ok(Some(job_id))` when a job was created, `Ok(None)` when the
/// engine declined the file without failing (a downstream precondition was not
/// met), and `Err` when creation failed. Timeouts are the implementor's concern.
#[async_trait]
pub trait JobCreator: Send + Sync {
    async fn create_job(
        &self,
        folder_id: &str,
        file_path: &Path,
        preset_id: &str,
    ) -> Result<Option<String>, JobCreationError>;
}
