//! Per-folder lifecycle counters.
//!
//! Counters are unsigned and every decrement saturates at zero. `staged` is
//! tracked through explicit increments and decrements and is never recomputed
//! from the pending list, except where a caller does so deliberately.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFolderCounts {
    /// Total files ever detected.
    pub detected: u64,
    /// Files currently awaiting action.
    pub staged: u64,
    /// Jobs created from this folder, manual or automatic.
    pub jobs_created: u64,
    /// Jobs reported completed by the job engine.
    pub completed: u64,
    /// Jobs reported failed by the job engine. Never cleared automatically.
    pub failed: u64,
}

impl WatchFolderCounts {
    /// An accepted, non-duplicate file was detected.
    pub fn record_detection(&mut self) {
        self.detected += 1;
        self.staged += 1;
    }

    /// Jobs were created manually; pending files were already cleared.
    pub fn record_manual_jobs(&mut self, count: u64) {
        self.jobs_created += count;
    }

    /// A job was created automatically. `staged` only drops if the file was
    /// still pending; a file cleared mid-attempt was already released.
    pub fn record_auto_job(&mut self, was_pending: bool) {
        if was_pending {
            self.staged = self.staged.saturating_sub(1);
        }
        self.jobs_created += 1;
    }

    /// Pending files were removed without creating jobs here.
    pub fn release_staged(&mut self, count: u64) {
        self.staged = self.staged.saturating_sub(count);
    }

    pub fn record_completed(&mut self) {
        self.completed += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Manual reset. `detected` restarts from the files still pending;
    /// `staged` already reflects them and is left as is.
    pub fn reset(&mut self, pending_len: usize) {
        self.detected = pending_len as u64;
        self.jobs_created = 0;
        self.completed = 0;
        self.failed = 0;
    }
}
