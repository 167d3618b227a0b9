//! One debounced file-system watch per folder, run on its own thread.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, PollWatcher, RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{
    new_debouncer, new_debouncer_opt, Config as DebouncerConfig, DebounceEventResult,
    DebouncedEventKind, Debouncer,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::schema::WatcherSettings;
use crate::error::WatchError;
use crate::watch::filter::FileFilter;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one running watcher. A restarted watcher gets a new token,
/// so events from its predecessor can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherToken(u64);

impl WatcherToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherEventKind {
    /// A settled file that passed the folder's filters.
    Detected(PathBuf),
    Error(String),
}

/// Event sent from a watcher thread to the registry's handler loop.
#[derive(Debug, Clone)]
pub struct WatcherEvent {
    pub folder_id: String,
    pub token: WatcherToken,
    pub kind: WatcherEventKind,
}

/// What a watcher needs to know about its folder.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub folder_id: String,
    pub path: PathBuf,
    pub recursive: bool,
    pub filter: FileFilter,
}

/// Keeps the debouncer alive for the lifetime of the watch thread.
/// Never read; dropping it stops the underlying watcher.
#[allow(dead_code)]
enum DebouncerGuard {
    Native(Debouncer<RecommendedWatcher>),
    Poll(Debouncer<PollWatcher>),
}

pub struct FolderWatcher {
    folder_id: String,
    path: PathBuf,
    token: WatcherToken,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("folder_id", &self.folder_id)
            .field("path", &self.path)
            .field("token", &self.token)
            .field("running", &self.is_running())
            .finish()
    }
}

impl FolderWatcher {
    /// Starts watching. Setup failures (missing path, permissions, backend
    /// errors) are returned here; later failures arrive as error events.
    pub fn start(
        target: WatchTarget,
        settings: &WatcherSettings,
        sender: UnboundedSender<WatcherEvent>,
    ) -> Result<Self, WatchError> {
        if !target.path.is_dir() {
            return Err(WatchError::PathNotFound(target.path.clone()));
        }

        let mode = if target.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let (tx, rx) = std::sync::mpsc::channel();
        let guard = match settings.poll_interval() {
            Some(interval) => {
                let poll_config = NotifyConfig::default().with_poll_interval(interval);
                let debouncer_config = DebouncerConfig::default()
                    .with_timeout(settings.debounce())
                    .with_notify_config(poll_config);
                let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
                    .map_err(|e| WatchError::Create {
                        path: target.path.clone(),
                        message: e.to_string(),
                    })?;
                debouncer
                    .watcher()
                    .watch(&target.path, mode)
                    .map_err(|e| WatchError::Watch {
                        path: target.path.clone(),
                        message: e.to_string(),
                    })?;
                DebouncerGuard::Poll(debouncer)
            }
            None => {
                let mut debouncer =
                    new_debouncer(settings.debounce(), tx).map_err(|e| WatchError::Create {
                        path: target.path.clone(),
                        message: e.to_string(),
                    })?;
                debouncer
                    .watcher()
                    .watch(&target.path, mode)
                    .map_err(|e| WatchError::Watch {
                        path: target.path.clone(),
                        message: e.to_string(),
                    })?;
                DebouncerGuard::Native(debouncer)
            }
        };

        let token = WatcherToken::next();
        let shutdown = Arc::new(AtomicBool::new(false));
        let folder_id = target.folder_id.clone();
        let path = target.path.clone();

        log::info!(
            "Watching folder {} at {}{}",
            folder_id,
            path.display(),
            if target.recursive { " (recursive)" } else { "" }
        );

        let thread_shutdown = Arc::clone(&shutdown);
        let settle_window = settings.debounce();
        let handle = std::thread::Builder::new()
            .name(format!("hopper-watch-{}", folder_id))
            .spawn(move || {
                let tracker = SettleTracker::new(settle_window);
                run_watch_loop(guard, rx, target, token, tracker, thread_shutdown, sender)
            })
            .map_err(|e| WatchError::Create {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            folder_id,
            path,
            token,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn token(&self) -> WatcherToken {
        self.token
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the watch thread and waits for it to exit.
    pub async fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let folder_id = self.folder_id.clone();
            match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(())) => log::debug!("Watcher for folder {} stopped", folder_id),
                Ok(Err(_)) => log::error!("Watcher thread for folder {} panicked", folder_id),
                Err(e) => log::error!("Failed to join watcher for folder {}: {}", folder_id, e),
            }
        }
    }

    fn stop_blocking(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.stop_blocking();
    }
}

fn run_watch_loop(
    guard: DebouncerGuard,
    rx: std::sync::mpsc::Receiver<DebounceEventResult>,
    target: WatchTarget,
    token: WatcherToken,
    mut tracker: SettleTracker,
    shutdown: Arc<AtomicBool>,
    sender: UnboundedSender<WatcherEvent>,
) {
    let emit = |kind: WatcherEventKind| {
        sender
            .send(WatcherEvent {
                folder_id: target.folder_id.clone(),
                token,
                kind,
            })
            .is_ok()
    };

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(events)) => {
                let now = Instant::now();
                for event in events {
                    if matches!(event.kind, DebouncedEventKind::Any) {
                        tracker.observe(&target, event.path, now);
                    }
                }
            }
            Ok(Err(errors)) => {
                let message = format!("{:?}", errors);
                log::warn!("Watch error in folder {}: {}", target.folder_id, message);
                if !emit(WatcherEventKind::Error(message)) {
                    return;
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                log::error!("Watch channel disconnected for folder {}", target.folder_id);
                emit(WatcherEventKind::Error(
                    "watch channel disconnected".to_string(),
                ));
                break;
            }
        }

        for path in tracker.settled(Instant::now()) {
            log::info!(
                "New file detected in folder {}: {}",
                target.folder_id,
                path.display()
            );
            if !emit(WatcherEventKind::Detected(path)) {
                log::debug!("Watch event receiver dropped, stopping");
                return;
            }
        }
    }

    drop(guard);
    log::info!("Stopped watching folder {}", target.folder_id);
}

/// True if the path is a file inside the watch scope that passes the folder's filters.
fn in_scope(target: &WatchTarget, path: &Path) -> bool {
    if !target.recursive {
        if let Ok(relative) = path.strip_prefix(&target.path) {
            if relative.components().count() > 1 {
                return false;
            }
        }
    }
    target.filter.accepts(path)
}

struct Candidate {
    size: u64,
    observed_at: Instant,
}

/// Follows each file from its first change until its size has held still for
/// a full window, then reports it once. A reported path is not reported
/// again until it disappears.
struct SettleTracker {
    window: Duration,
    candidates: HashMap<PathBuf, Candidate>,
    reported: HashSet<PathBuf>,
}

impl SettleTracker {
    fn new(window: Duration) -> Self {
        Self {
            window,
            candidates: HashMap::new(),
            reported: HashSet::new(),
        }
    }

    /// Records a debounced change to `path`.
    fn observe(&mut self, target: &WatchTarget, path: PathBuf, now: Instant) {
        let size = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata.len(),
            Ok(_) => return,
            Err(_) => {
                // Gone: a later file at this path is a new appearance.
                self.candidates.remove(&path);
                self.reported.remove(&path);
                return;
            }
        };

        if self.reported.contains(&path) || !in_scope(target, &path) {
            return;
        }
        self.candidates.insert(
            path,
            Candidate {
                size,
                observed_at: now,
            },
        );
    }

    /// Paths whose size has not changed for a full window since their last change.
    fn settled(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        let mut ready = Vec::new();

        self.candidates.retain(|path, candidate| {
            if now.saturating_duration_since(candidate.observed_at) < window {
                return true;
            }
            match std::fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => {
                    if metadata.len() == candidate.size {
                        ready.push(path.clone());
                        false
                    } else {
                        candidate.size = metadata.len();
                        candidate.observed_at = now;
                        true
                    }
                }
                _ => false,
            }
        });

        ready.sort();
        self.reported.extend(ready.iter().cloned());
        ready
    }
}
