//! Scripted job creators for driving automatic job creation in tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use hopper::{JobCreationError, JobCreator};

/// What the creator answers to every call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Creates a job with ids `job-1`, `job-2`, ...
    Create,
    /// Declines without failing.
    Decline,
    /// Fails with the given message.
    Fail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorCall {
    pub folder_id: String,
    pub file_path: PathBuf,
    pub preset_id: String,
}

pub struct ScriptedCreator {
    script: Script,
    next_id: AtomicUsize,
    calls: Mutex<Vec<CreatorCall>>,
    /// When set, each call waits for a permit before answering.
    gate: Option<Semaphore>,
}

impl ScriptedCreator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            next_id: AtomicUsize::new(1),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Like [`ScriptedCreator::creating`], but every call is held until
    /// [`ScriptedCreator::release`] lets it through.
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::creating()
        }
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn creating() -> Self {
        Self::new(Script::Create)
    }

    pub fn declining() -> Self {
        Self::new(Script::Decline)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Script::Fail(message.to_string()))
    }

    pub fn calls(&self) -> Vec<CreatorCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobCreator for ScriptedCreator {
    async fn create_job(
        &self,
        folder_id: &str,
        file_path: &Path,
        preset_id: &str,
    ) -> Result<Option<String>, JobCreationError> {
        self.calls.lock().unwrap().push(CreatorCall {
            folder_id: folder_id.to_string(),
            file_path: file_path.to_path_buf(),
            preset_id: preset_id.to_string(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| JobCreationError::Unavailable(e.to_string()))?
                .forget();
        }

        match &self.script {
            Script::Create => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(Some(format!("job-{}", n)))
            }
            Script::Decline => Ok(None),
            Script::Fail(message) => Err(JobCreationError::Failed(message.clone())),
        }
    }
}
