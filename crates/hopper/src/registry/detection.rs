//! Detection path: watcher events, pending-file intake, auto jobs and rescans.

use std::path::{Path, PathBuf};

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use walkdir::WalkDir;

use super::WatchFolderRegistry;
use crate::broadcast::TraceEvent;
use crate::folder::PendingFile;
use crate::jobs::{AutoJobOutcome, AutoJobRequest};
use crate::watch::{WatcherEvent, WatcherEventKind, WatcherToken};

impl WatchFolderRegistry {
    /// Ingests a detected path for a folder and, if the folder is armed,
    /// attempts an automatic job before returning.
    ///
    /// Returns the new pending file, or `None` when the path was filtered,
    /// already pending, unreadable, or the folder is unknown.
    pub async fn handle_detection(&self, id: &str, path: &Path) -> Option<PendingFile> {
        let (file, request) = self.ingest(id, path, None).await?;
        if let Some(request) = request {
            self.run_auto_job(request).await;
        }
        Some(file)
    }

    /// Walks the folder for accepted files that are not yet pending and
    /// ingests them. Returns how many were added, or `None` for an unknown id.
    pub async fn rescan(&self, id: &str) -> Option<usize> {
        let (root, recursive, filter) = {
            let folders = self.inner.folders.lock().await;
            let entry = folders.get(id)?;
            (
                entry.folder.path.clone(),
                entry.folder.recursive,
                entry.filter.clone(),
            )
        };

        let walk_root = root.clone();
        let candidates = tokio::task::spawn_blocking(move || {
            let max_depth = if recursive { usize::MAX } else { 1 };
            WalkDir::new(&walk_root)
                .max_depth(max_depth)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("Skipping unreadable entry during rescan: {}", e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| filter.accepts(path))
                .collect::<Vec<PathBuf>>()
        })
        .await;

        let candidates = match candidates {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Rescan of {} failed: {}", root.display(), e);
                return Some(0);
            }
        };

        let span = info_span!("rescan", folder_id = %id, candidates = candidates.len());
        async {
            let mut added = 0;
            for path in candidates {
                if self.handle_detection(id, &path).await.is_some() {
                    added += 1;
                }
            }
            info!("Rescan of {} found {} new file(s)", root.display(), added);
            Some(added)
        }
        .instrument(span)
        .await
    }

    /// Starts the loop that applies watcher events in arrival order.
    /// Returns `None` if the loop was already started.
    pub fn spawn_event_loop(&self) -> Option<JoinHandle<()>> {
        let mut rx = {
            let mut guard = match self.inner.event_rx.lock() {
                Ok(g) => g,
                Err(poisoned) => {
                    warn!("Event receiver lock was poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            guard.take()?
        };
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let registry = self.clone();

        Some(tokio::spawn(async move {
            if *shutdown_rx.borrow() {
                return;
            }
            registry.inner.trace.record(TraceEvent::Ready, None, None);
            info!("Watch folder event loop ready");

            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => registry.dispatch_event(event).await,
                        None => break,
                    },
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Watch folder event loop stopped");
        }))
    }

    async fn dispatch_event(&self, event: WatcherEvent) {
        match event.kind {
            WatcherEventKind::Detected(path) => {
                if let Some((_, Some(request))) =
                    self.ingest(&event.folder_id, &path, Some(event.token)).await
                {
                    let registry = self.clone();
                    tokio::spawn(async move { registry.run_auto_job(request).await });
                }
            }
            WatcherEventKind::Error(message) => {
                self.apply_watcher_error(&event.folder_id, &message, Some(event.token))
                    .await;
            }
        }
    }

    /// Filters, stats and enqueues one path. The stat happens outside the
    /// lock, so every check is repeated once the lock is retaken.
    async fn ingest(
        &self,
        id: &str,
        path: &Path,
        token: Option<WatcherToken>,
    ) -> Option<(PendingFile, Option<AutoJobRequest>)> {
        {
            let folders = self.inner.folders.lock().await;
            let entry = folders.get(id)?;
            if !entry.accepts_token(token) {
                debug!("Dropping event from a retired watcher of folder {}", id);
                return None;
            }
            if !entry.filter.accepts(path) {
                debug!("Filtered out {}", path.display());
                return None;
            }
            if entry.folder.is_pending(path) {
                debug!("Already pending: {}", path.display());
                return None;
            }
        }

        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            Ok(_) => return None,
            Err(e) => {
                warn!("Could not stat {}: {}", path.display(), e);
                return None;
            }
        };

        let mut folders = self.inner.folders.lock().await;
        let entry = folders.get_mut(id)?;
        if !entry.accepts_token(token) || !entry.filter.accepts(path) {
            return None;
        }

        let file = PendingFile::new(path, size);
        if !entry.folder.enqueue(file.clone()) {
            return None;
        }
        entry.folder.touch();

        self.inner.trace.folder(
            TraceEvent::FileDetected,
            id,
            json!({ "filePath": path.to_string_lossy(), "size": size }),
        );
        self.inner.broadcaster.file_detected(id, file.clone());

        let request = self
            .inner
            .orchestrator
            .request_for(&entry.folder, path.to_path_buf());
        self.publish_snapshot(&folders);

        Some((file, request))
    }

    /// One attempt, never retried. The job creator runs without the folder lock.
    async fn run_auto_job(&self, request: AutoJobRequest) {
        let Some(outcome) = self.inner.orchestrator.dispatch(&request).await else {
            debug!(
                "Job creator went away before {} could be submitted",
                request.file_path.display()
            );
            return;
        };

        let mut folders = self.inner.folders.lock().await;
        match folders.get_mut(&request.folder_id) {
            Some(entry) => {
                self.inner
                    .orchestrator
                    .reconcile(&mut entry.folder, &request, &outcome);
                if matches!(outcome, AutoJobOutcome::Created { .. }) {
                    self.publish_snapshot(&folders);
                }
            }
            None => self.inner.orchestrator.orphaned(&request, &outcome),
        }
    }
}
