//! The watch folder registry: single owner of all folder state.
//!
//! Every mutation goes through the operations on [`WatchFolderRegistry`].
//! Folder state lives behind one async mutex, so watcher events, operator
//! calls and auto-job reconciliation are applied one at a time. The job
//! creator is awaited outside the lock.

mod detection;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::broadcast::{TraceEvent, TraceLogger, TraceRecord, WatchFolderBroadcaster, WatchFolderEvent};
use crate::config::loader::{validate_path, validate_preset_id};
use crate::config::{validate_folder_config, HopperConfig, WatchFolderConfig, WatchFolderPatch, WatcherSettings};
use crate::error::Result;
use crate::folder::{validate_arm, ArmOutcome, PendingFile, WatchFolder};
use crate::jobs::{AutoJobOrchestrator, JobCreator};
use crate::watch::{FileFilter, FolderWatcher, WatchTarget, WatcherEvent, WatcherToken};

/// Disarm reasons recorded in `DISARMED` trace records.
pub mod disarm_reasons {
    pub const MANUAL: &str = "manual";
    pub const PAUSED: &str = "paused";
    pub const PRESET_REMOVED: &str = "preset_removed";
    pub const WATCHER_ERROR: &str = "watcher_error";
}

struct FolderEntry {
    folder: WatchFolder,
    filter: FileFilter,
    watcher: Option<FolderWatcher>,
}

impl FolderEntry {
    fn watch_target(&self) -> WatchTarget {
        WatchTarget {
            folder_id: self.folder.id.clone(),
            path: self.folder.path.clone(),
            recursive: self.folder.recursive,
            filter: self.filter.clone(),
        }
    }

    /// Events without a token come from direct calls and always apply.
    fn accepts_token(&self, token: Option<WatcherToken>) -> bool {
        match token {
            None => true,
            Some(token) => self.watcher.as_ref().map(FolderWatcher::token) == Some(token),
        }
    }
}

struct RegistryInner {
    folders: Mutex<HashMap<String, FolderEntry>>,
    settings: WatcherSettings,
    broadcaster: WatchFolderBroadcaster,
    trace: TraceLogger,
    orchestrator: AutoJobOrchestrator,
    event_tx: mpsc::UnboundedSender<WatcherEvent>,
    event_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<WatcherEvent>>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Cheap to clone; clones share the same folders.
#[derive(Clone)]
pub struct WatchFolderRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchFolderRegistry {
    /// An empty registry. Watcher events are only processed once
    /// [`spawn_event_loop`](Self::spawn_event_loop) has been called.
    pub fn new(settings: WatcherSettings) -> Self {
        let broadcaster = WatchFolderBroadcaster::new(settings.event_capacity);
        let trace = TraceLogger::new(settings.trace_capacity);
        let orchestrator = AutoJobOrchestrator::new(trace.clone());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(RegistryInner {
                folders: Mutex::new(HashMap::new()),
                settings,
                broadcaster,
                trace,
                orchestrator,
                event_tx,
                event_rx: std::sync::Mutex::new(Some(event_rx)),
                shutdown_tx,
            }),
        }
    }

    /// Builds a registry from a configuration file's contents, adding every folder.
    pub async fn from_config(config: &HopperConfig) -> Result<Self> {
        let registry = Self::new(config.settings.clone());
        registry.load(config).await?;
        Ok(registry)
    }

    /// Adds every configured folder. Stops at the first invalid one.
    pub async fn load(&self, config: &HopperConfig) -> Result<Vec<WatchFolder>> {
        let mut added = Vec::with_capacity(config.folders.len());
        for folder in &config.folders {
            added.push(self.add(folder.clone()).await?);
        }
        info!("Loaded {} watch folder(s) from config", added.len());
        Ok(added)
    }

    /// Builder form of [`set_job_creator`](Self::set_job_creator).
    pub fn with_job_creator(self, creator: Arc<dyn JobCreator>) -> Self {
        self.set_job_creator(creator);
        self
    }

    /// Registers the job creation capability, replacing any previous one.
    pub fn set_job_creator(&self, creator: Arc<dyn JobCreator>) {
        self.inner.orchestrator.set_job_creator(creator);
    }

    /// Watcher settings shared by every folder.
    pub fn settings(&self) -> &WatcherSettings {
        &self.inner.settings
    }

    /// State snapshots and per-folder events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WatchFolderEvent> {
        self.inner.broadcaster.subscribe()
    }

    /// Audit records.
    pub fn subscribe_trace(&self) -> broadcast::Receiver<TraceRecord> {
        self.inner.trace.subscribe()
    }

    // ─── CRUD ───────────────────────────────────────────────────────────────

    /// Validates and registers a folder, starting its watcher when enabled.
    ///
    /// New folders are never armed. A watcher that fails to start does not
    /// fail the call; the folder is kept with its error recorded.
    pub async fn add(&self, config: WatchFolderConfig) -> Result<WatchFolder> {
        validate_folder_config(&config)?;
        let filter = FileFilter::new(&config.include_extensions, &config.exclude_patterns)?
            .rooted_at(config.path.clone());

        let mut entry = FolderEntry {
            folder: WatchFolder::from_config(&config),
            filter,
            watcher: None,
        };
        let id = entry.folder.id.clone();

        self.inner.trace.folder(
            TraceEvent::Added,
            &id,
            json!({
                "path": entry.folder.path.to_string_lossy(),
                "enabled": entry.folder.enabled,
                "recursive": entry.folder.recursive,
                "presetId": entry.folder.preset_id,
            }),
        );

        let mut folders = self.inner.folders.lock().await;
        if entry.folder.enabled {
            self.start_watcher(&mut entry);
        }

        let snapshot = entry.folder.clone();
        folders.insert(id, entry);
        self.publish_snapshot(&folders);

        info!("Added watch folder {} at {}", snapshot.id, snapshot.path.display());
        Ok(snapshot)
    }

    /// Stops the folder's watcher, then deletes the folder.
    pub async fn remove(&self, id: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };
        Self::stop_watcher(entry).await;

        let Some(entry) = folders.remove(id) else {
            return false;
        };
        self.inner.trace.folder(
            TraceEvent::Removed,
            id,
            json!({ "path": entry.folder.path.to_string_lossy() }),
        );
        self.publish_snapshot(&folders);

        info!("Removed watch folder {}", id);
        true
    }

    /// Applies the fields present in `patch`. Changes to what is watched
    /// restart the watcher. Returns `Ok(None)` for an unknown id.
    pub async fn update(&self, id: &str, patch: WatchFolderPatch) -> Result<Option<WatchFolder>> {
        if let Some(path) = &patch.path {
            validate_path(path)?;
        }
        if let Some(Some(preset_id)) = &patch.preset_id {
            validate_preset_id(preset_id)?;
        }

        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return Ok(None);
        };

        let include = patch
            .include_extensions
            .clone()
            .unwrap_or_else(|| entry.folder.include_extensions.clone());
        let exclude = patch
            .exclude_patterns
            .clone()
            .unwrap_or_else(|| entry.folder.exclude_patterns.clone());
        let root = patch
            .path
            .clone()
            .unwrap_or_else(|| entry.folder.path.clone());
        let filter = FileFilter::new(&include, &exclude)?.rooted_at(root);

        let restart = patch.touches_watch();
        if restart {
            Self::stop_watcher(entry).await;
        }

        let was_enabled = entry.folder.enabled;
        let folder = &mut entry.folder;
        if let Some(path) = patch.path {
            folder.path = path;
        }
        if let Some(enabled) = patch.enabled {
            folder.enabled = enabled;
        }
        if let Some(recursive) = patch.recursive {
            folder.recursive = recursive;
        }
        if let Some(preset_id) = patch.preset_id {
            folder.preset_id = preset_id;
        }
        folder.include_extensions = include;
        folder.exclude_patterns = exclude;
        entry.filter = filter;

        if entry.folder.armed {
            let reason = if !entry.folder.enabled {
                Some(disarm_reasons::PAUSED)
            } else if !entry.folder.has_preset() {
                Some(disarm_reasons::PRESET_REMOVED)
            } else {
                None
            };
            if let Some(reason) = reason {
                entry.folder.armed = false;
                self.trace_disarmed(id, reason);
            }
        }

        match (was_enabled, entry.folder.enabled) {
            (false, true) => self.inner.trace.folder(TraceEvent::Enabled, id, json!({})),
            (true, false) => self.inner.trace.folder(TraceEvent::Disabled, id, json!({})),
            _ => {}
        }

        if restart && entry.folder.enabled {
            entry.folder.error = None;
            self.start_watcher(entry);
        }

        entry.folder.touch();
        let snapshot = entry.folder.clone();
        self.publish_snapshot(&folders);

        debug!("Updated watch folder {}", id);
        Ok(Some(snapshot))
    }

    /// Snapshot of one folder.
    pub async fn get(&self, id: &str) -> Option<WatchFolder> {
        let folders = self.inner.folders.lock().await;
        folders.get(id).map(|entry| entry.folder.clone())
    }

    /// All folders, oldest first.
    pub async fn list(&self) -> Vec<WatchFolder> {
        let folders = self.inner.folders.lock().await;
        Self::sorted(&folders)
    }

    // ─── Enable / disable ───────────────────────────────────────────────────

    /// Starts watching. A folder that is already enabled with a healthy
    /// watcher is left as is. Clears any stale watcher error.
    pub async fn enable(&self, id: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        if entry.folder.enabled && entry.watcher.is_some() && !entry.folder.has_error() {
            return true;
        }

        Self::stop_watcher(entry).await;

        // Arming survives only while its preconditions still hold.
        if entry.folder.armed && (!entry.folder.has_preset() || entry.folder.has_error()) {
            entry.folder.armed = false;
        }
        entry.folder.enabled = true;
        entry.folder.error = None;
        self.inner.trace.folder(
            TraceEvent::Enabled,
            id,
            json!({ "path": entry.folder.path.to_string_lossy() }),
        );

        self.start_watcher(entry);
        entry.folder.touch();
        self.publish_snapshot(&folders);
        true
    }

    /// Stops watching. Always disarms: automation cannot run while paused.
    pub async fn disable(&self, id: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        if !entry.folder.enabled && entry.watcher.is_none() && !entry.folder.armed {
            return true;
        }

        let was_armed = entry.folder.armed;
        Self::stop_watcher(entry).await;
        entry.folder.enabled = false;
        entry.folder.armed = false;
        entry.folder.touch();

        self.inner.trace.folder(TraceEvent::Disabled, id, json!({}));
        if was_armed {
            self.trace_disarmed(id, disarm_reasons::PAUSED);
        }
        self.publish_snapshot(&folders);
        true
    }

    // ─── Arming ─────────────────────────────────────────────────────────────

    /// Arms the folder if every precondition holds. Returns `None` for an unknown id.
    pub async fn arm(&self, id: &str) -> Option<ArmOutcome> {
        let mut folders = self.inner.folders.lock().await;
        let entry = folders.get_mut(id)?;

        let validation = validate_arm(&entry.folder);
        if !validation.can_arm {
            info!(
                "Arming folder {} blocked: {:?}",
                id, validation.block_reasons
            );
            self.inner.trace.folder(
                TraceEvent::ArmBlocked,
                id,
                json!({ "blockReasons": validation.block_reasons }),
            );
            return Some(ArmOutcome::blocked(validation.block_reasons));
        }

        entry.folder.armed = true;
        entry.folder.touch();
        self.inner.trace.folder(
            TraceEvent::Armed,
            id,
            json!({ "presetId": entry.folder.preset_id }),
        );
        self.publish_snapshot(&folders);

        info!("Armed folder {}", id);
        Some(ArmOutcome::armed())
    }

    /// Disarms the folder. Disarming an unarmed folder succeeds silently.
    pub async fn disarm(&self, id: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        if !entry.folder.armed {
            return true;
        }

        entry.folder.armed = false;
        entry.folder.touch();
        self.trace_disarmed(id, disarm_reasons::MANUAL);
        self.publish_snapshot(&folders);

        info!("Disarmed folder {}", id);
        true
    }

    // ─── Pending files ──────────────────────────────────────────────────────

    /// Flips the selection of one pending file. False if the folder or file is unknown.
    pub async fn toggle_file_selection(&self, id: &str, path: &Path) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };
        if !entry.folder.toggle_selection(path) {
            return false;
        }
        entry.folder.touch();
        self.publish_snapshot(&folders);
        true
    }

    /// Sets the selection of every pending file. False for an unknown id.
    pub async fn select_all(&self, id: &str, selected: bool) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };
        entry.folder.select_all(selected);
        entry.folder.touch();
        self.publish_snapshot(&folders);
        true
    }

    /// Pending files currently selected, for bulk job creation by an operator.
    pub async fn selected_pending(&self, id: &str) -> Option<Vec<PendingFile>> {
        let folders = self.inner.folders.lock().await;
        folders.get(id).map(|entry| entry.folder.selected_files())
    }

    /// Removes the named pending files and releases them from `staged`.
    /// Returns how many were removed, or `None` for an unknown id.
    pub async fn clear_pending(&self, id: &str, paths: &[PathBuf]) -> Option<usize> {
        let mut folders = self.inner.folders.lock().await;
        let entry = folders.get_mut(id)?;

        let removed = entry.folder.clear_pending(paths);
        entry.folder.touch();
        if removed > 0 {
            self.inner.trace.folder(
                TraceEvent::CountsUpdated,
                id,
                json!({
                    "reason": "pending_cleared",
                    "removed": removed,
                    "counts": entry.folder.counts,
                }),
            );
        }
        self.publish_snapshot(&folders);
        Some(removed)
    }

    // ─── Job lifecycle feed-in ──────────────────────────────────────────────

    /// Records jobs created manually from this folder's pending files.
    pub async fn log_jobs_created(&self, id: &str, job_ids: &[String]) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        entry.folder.counts.record_manual_jobs(job_ids.len() as u64);
        entry.folder.touch();
        self.inner.trace.folder(
            TraceEvent::JobsCreated,
            id,
            json!({ "jobIds": job_ids, "count": job_ids.len() }),
        );
        self.publish_snapshot(&folders);
        true
    }

    /// Counts a completed job reported by the job engine.
    pub async fn record_job_completed(&self, id: &str, job_id: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        entry.folder.counts.record_completed();
        entry.folder.touch();
        self.inner
            .trace
            .folder(TraceEvent::JobCompleted, id, json!({ "jobId": job_id }));
        self.publish_snapshot(&folders);
        true
    }

    /// Counts a failed job. The failure count survives until a manual reset.
    pub async fn record_job_failed(&self, id: &str, job_id: &str, error: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        entry.folder.counts.record_failed();
        entry.folder.touch();
        self.inner.trace.folder(
            TraceEvent::JobFailed,
            id,
            json!({ "jobId": job_id, "error": error }),
        );
        self.publish_snapshot(&folders);
        true
    }

    /// Restarts `detected` from the current pending files and zeroes job
    /// counters. `staged` is left as tracked.
    pub async fn reset_counts(&self, id: &str) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };

        let pending = entry.folder.pending_files.len();
        entry.folder.counts.reset(pending);
        entry.folder.touch();
        self.inner.trace.folder(
            TraceEvent::CountsUpdated,
            id,
            json!({ "reason": "reset", "counts": entry.folder.counts }),
        );
        self.publish_snapshot(&folders);
        true
    }

    // ─── Watcher errors ─────────────────────────────────────────────────────

    /// Records a watcher failure on the folder and stops its watcher.
    pub async fn handle_watcher_error(&self, id: &str, message: &str) -> bool {
        self.apply_watcher_error(id, message, None).await
    }

    async fn apply_watcher_error(
        &self,
        id: &str,
        message: &str,
        token: Option<WatcherToken>,
    ) -> bool {
        let mut folders = self.inner.folders.lock().await;
        let Some(entry) = folders.get_mut(id) else {
            return false;
        };
        if !entry.accepts_token(token) {
            debug!("Ignoring error from a retired watcher of folder {}", id);
            return false;
        }

        Self::stop_watcher(entry).await;
        self.record_watcher_error(entry, message);
        self.publish_snapshot(&folders);
        true
    }

    /// Sets the folder error, disarming first so an errored folder is never armed.
    fn record_watcher_error(&self, entry: &mut FolderEntry, message: &str) {
        let id = entry.folder.id.clone();
        error!("Watcher error in folder {}: {}", id, message);

        if entry.folder.armed {
            entry.folder.armed = false;
            self.trace_disarmed(&id, disarm_reasons::WATCHER_ERROR);
        }
        entry.folder.error = Some(message.to_string());
        entry.folder.touch();

        self.inner
            .trace
            .folder(TraceEvent::Error, &id, json!({ "error": message }));
        self.inner.broadcaster.error(&id, message);
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Stops every watcher and the event loop. Folders are kept.
    pub async fn shutdown(&self) {
        // Stored even with no loop subscribed, so a later loop sees it.
        self.inner.shutdown_tx.send_replace(true);

        let mut folders = self.inner.folders.lock().await;
        for entry in folders.values_mut() {
            Self::stop_watcher(entry).await;
        }
        info!("Watch folder registry shut down");
    }

    // ─── Helpers ────────────────────────────────────────────────────────────

    /// Starts a watcher for the entry, recording a failure as a folder error.
    fn start_watcher(&self, entry: &mut FolderEntry) -> bool {
        match FolderWatcher::start(
            entry.watch_target(),
            &self.inner.settings,
            self.inner.event_tx.clone(),
        ) {
            Ok(watcher) => {
                entry.watcher = Some(watcher);
                entry.folder.error = None;
                entry.folder.touch();
                true
            }
            Err(e) => {
                warn!("Failed to start watcher for folder {}: {}", entry.folder.id, e);
                self.record_watcher_error(entry, &e.to_string());
                false
            }
        }
    }

    async fn stop_watcher(entry: &mut FolderEntry) {
        if let Some(watcher) = entry.watcher.take() {
            watcher.stop().await;
        }
    }

    fn trace_disarmed(&self, id: &str, reason: &str) {
        self.inner
            .trace
            .folder(TraceEvent::Disarmed, id, json!({ "reason": reason }));
    }

    fn sorted(folders: &HashMap<String, FolderEntry>) -> Vec<WatchFolder> {
        let mut list: Vec<WatchFolder> = folders.values().map(|e| e.folder.clone()).collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    fn publish_snapshot(&self, folders: &HashMap<String, FolderEntry>) {
        self.inner.broadcaster.state_changed(Self::sorted(folders));
    }
}
