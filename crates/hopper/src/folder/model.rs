use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::schema::WatchFolderConfig;
use crate::folder::counts::WatchFolderCounts;

/// Cached view of a folder's mode, derived from `enabled` and `armed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WatchFolderStatus {
    Watching,
    Paused,
    Armed,
}

impl WatchFolderStatus {
    pub fn derive(enabled: bool, armed: bool) -> Self {
        match (enabled, armed) {
            (false, _) => WatchFolderStatus::Paused,
            (true, true) => WatchFolderStatus::Armed,
            (true, false) => WatchFolderStatus::Watching,
        }
    }
}

impl std::fmt::Display for WatchFolderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchFolderStatus::Watching => write!(f, "watching"),
            WatchFolderStatus::Paused => write!(f, "paused"),
            WatchFolderStatus::Armed => write!(f, "armed"),
        }
    }
}

/// A detected file awaiting operator or automatic action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingFile {
    pub path: PathBuf,
    /// Size in bytes at detection time.
    pub size: u64,
    pub detected_at: DateTime<Utc>,
    /// Used for bulk operator actions.
    pub selected: bool,
}

impl PendingFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            detected_at: Utc::now(),
            selected: true,
        }
    }
}

/// A monitored directory and everything known about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFolder {
    /// Registry-assigned UUID.
    pub id: String,
    /// Absolute path of the watched directory.
    pub path: PathBuf,
    pub enabled: bool,
    /// Derived from `enabled` and `armed`, refreshed by [`WatchFolder::touch`].
    pub status: WatchFolderStatus,
    /// Whether detected files get a job automatically. Never persisted as
    /// true across a restart.
    pub armed: bool,
    pub recursive: bool,
    /// Preset used for automatic jobs. Required to arm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,
    /// Extensions to accept, any case, dot optional. Empty means the default media set.
    pub include_extensions: Vec<String>,
    /// Glob patterns, matched relative to `path`.
    pub exclude_patterns: Vec<String>,
    /// Detected files awaiting action, in detection order.
    pub pending_files: Vec<PendingFile>,
    pub counts: WatchFolderCounts,
    /// Last watcher error. Blocks arming while present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchFolder {
    /// Creates a new folder from its configuration. Always starts disarmed.
    pub fn from_config(config: &WatchFolderConfig) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: config.path.clone(),
            enabled: config.enabled,
            status: WatchFolderStatus::derive(config.enabled, false),
            armed: false,
            recursive: config.recursive,
            preset_id: config.preset_id.clone(),
            include_extensions: config.include_extensions.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            pending_files: Vec::new(),
            counts: WatchFolderCounts::default(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the folder as mutated and refreshes the cached status.
    pub fn touch(&mut self) {
        self.status = WatchFolderStatus::derive(self.enabled, self.armed);
        self.updated_at = Utc::now();
    }

    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn has_preset(&self) -> bool {
        self.preset_id.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending_files.iter().any(|f| f.path == path)
    }

    /// Enqueues a newly detected file. Returns false for a path already pending.
    pub fn enqueue(&mut self, file: PendingFile) -> bool {
        if self.is_pending(&file.path) {
            return false;
        }
        self.pending_files.push(file);
        self.counts.record_detection();
        true
    }

    /// Removes a single path from the pending list without touching counters.
    pub fn take_pending(&mut self, path: &Path) -> Option<PendingFile> {
        let index = self.pending_files.iter().position(|f| f.path == path)?;
        Some(self.pending_files.remove(index))
    }

    /// Removes the named paths and releases them from `staged`. Returns how many were removed.
    pub fn clear_pending(&mut self, paths: &[PathBuf]) -> usize {
        let before = self.pending_files.len();
        self.pending_files.retain(|f| !paths.contains(&f.path));
        let removed = before - self.pending_files.len();
        self.counts.release_staged(removed as u64);
        removed
    }

    /// Flips the selection flag of a pending file. Returns false if the path is not pending.
    pub fn toggle_selection(&mut self, path: &Path) -> bool {
        match self.pending_files.iter_mut().find(|f| f.path == path) {
            Some(file) => {
                file.selected = !file.selected;
                true
            }
            None => false,
        }
    }

    pub fn select_all(&mut self, selected: bool) {
        for file in &mut self.pending_files {
            file.selected = selected;
        }
    }

    pub fn selected_files(&self) -> Vec<PendingFile> {
        self.pending_files
            .iter()
            .filter(|f| f.selected)
            .cloned()
            .collect()
    }
}
