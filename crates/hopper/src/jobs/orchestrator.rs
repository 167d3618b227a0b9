//! Automatic job creation for armed folders.
//!
//! One attempt per detection, never retried. The attempt itself runs without
//! access to folder state; its outcome is applied afterwards by the registry
//! through [`AutoJobOrchestrator::reconcile`].

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::broadcast::trace::{TraceEvent, TraceLogger};
use crate::folder::WatchFolder;
use crate::jobs::creator::JobCreator;

/// Reason recorded when the job creator declines a file.
pub const REASON_RETURNED_NULL: &str = "job_creation_returned_null";
/// Reason recorded when the job creator fails.
pub const REASON_ERROR: &str = "job_creation_error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoJobRequest {
    pub folder_id: String,
    pub file_path: PathBuf,
    pub preset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoJobOutcome {
    Created { job_id: String },
    Declined,
    Failed { error: String },
}

pub struct AutoJobOrchestrator {
    creator: RwLock<Option<Arc<dyn JobCreator>>>,
    trace: TraceLogger,
}

impl AutoJobOrchestrator {
    pub fn new(trace: TraceLogger) -> Self {
        Self {
            creator: RwLock::new(None),
            trace,
        }
    }

    /// Registers the job creator, replacing any previous one.
    pub fn set_job_creator(&self, creator: Arc<dyn JobCreator>) {
        let mut guard = match self.creator.write() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Job creator lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(creator);
    }

    pub fn job_creator(&self) -> Option<Arc<dyn JobCreator>> {
        let guard = match self.creator.read() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Job creator lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    pub fn has_job_creator(&self) -> bool {
        self.job_creator().is_some()
    }

    /// Builds a request if the folder qualifies for an automatic attempt.
    pub fn request_for(&self, folder: &WatchFolder, file_path: PathBuf) -> Option<AutoJobRequest> {
        if !folder.armed {
            return None;
        }
        let preset_id = folder.preset_id.clone().filter(|p| !p.is_empty())?;
        if !self.has_job_creator() {
            debug!(
                "Folder {} is armed but no job creator is registered; {} stays pending",
                folder.id,
                file_path.display()
            );
            return None;
        }

        Some(AutoJobRequest {
            folder_id: folder.id.clone(),
            file_path,
            preset_id,
        })
    }

    /// Calls the job creator. Returns `None` if no creator is registered anymore.
    pub async fn dispatch(&self, request: &AutoJobRequest) -> Option<AutoJobOutcome> {
        let creator = self.job_creator()?;

        info!(
            "Creating job for {} (folder {}, preset {})",
            request.file_path.display(),
            request.folder_id,
            request.preset_id
        );

        let outcome = match creator
            .create_job(&request.folder_id, &request.file_path, &request.preset_id)
            .await
        {
            Ok(Some(job_id)) => AutoJobOutcome::Created { job_id },
            Ok(None) => AutoJobOutcome::Declined,
            Err(e) => AutoJobOutcome::Failed {
                error: e.to_string(),
            },
        };

        Some(outcome)
    }

    /// Applies an outcome to its folder and records it in the audit trail.
    pub fn reconcile(
        &self,
        folder: &mut WatchFolder,
        request: &AutoJobRequest,
        outcome: &AutoJobOutcome,
    ) {
        match outcome {
            AutoJobOutcome::Created { job_id } => {
                let was_pending = folder.take_pending(&request.file_path).is_some();
                folder.counts.record_auto_job(was_pending);
                folder.touch();

                info!(
                    "Auto job {} created for {} in folder {}",
                    job_id,
                    request.file_path.display(),
                    folder.id
                );
            }
            AutoJobOutcome::Declined => {
                info!(
                    "Job creation declined for {} in folder {}; file stays pending",
                    request.file_path.display(),
                    folder.id
                );
            }
            AutoJobOutcome::Failed { error } => {
                warn!(
                    "Job creation failed for {} in folder {}: {}",
                    request.file_path.display(),
                    folder.id,
                    error
                );
            }
        }

        self.record_outcome(request, outcome, false);
    }

    /// Records an outcome whose folder was removed while the attempt was in flight.
    pub fn orphaned(&self, request: &AutoJobRequest, outcome: &AutoJobOutcome) {
        warn!(
            "Folder {} was removed while creating a job for {}",
            request.folder_id,
            request.file_path.display()
        );
        self.record_outcome(request, outcome, true);
    }

    fn record_outcome(&self, request: &AutoJobRequest, outcome: &AutoJobOutcome, orphaned: bool) {
        let file_path = request.file_path.to_string_lossy();
        let (event, mut details) = match outcome {
            AutoJobOutcome::Created { job_id } => (
                TraceEvent::AutoJobCreated,
                json!({
                    "filePath": file_path,
                    "presetId": request.preset_id,
                    "jobId": job_id,
                }),
            ),
            AutoJobOutcome::Declined => (
                TraceEvent::AutoJobBlocked,
                json!({
                    "filePath": file_path,
                    "presetId": request.preset_id,
                    "reason": REASON_RETURNED_NULL,
                }),
            ),
            AutoJobOutcome::Failed { error } => (
                TraceEvent::AutoJobBlocked,
                json!({
                    "filePath": file_path,
                    "presetId": request.preset_id,
                    "reason": REASON_ERROR,
                    "error": error,
                }),
            ),
        };

        if orphaned {
            details["orphaned"] = json!(true);
        }

        self.trace.folder(event, &request.folder_id, details);
    }
}
