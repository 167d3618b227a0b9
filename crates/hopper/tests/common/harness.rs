//! Test harness for isolated registry execution.
//!
//! Each harness owns a temporary inbox directory and a registry tuned for
//! tests: polling backend, short quiescence window.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use hopper::{
    JobCreator, TraceEvent, TraceRecord, WatchFolder, WatchFolderConfig, WatchFolderEvent,
    WatchFolderRegistry, WatcherSettings,
};

/// How long tests wait on anything driven by the file system.
pub const FS_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory the default folder watches.
    pub inbox: PathBuf,
    pub registry: WatchFolderRegistry,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox = temp_dir.path().join("inbox");
        std::fs::create_dir_all(&inbox).expect("Failed to create inbox");

        Self {
            temp_dir,
            inbox,
            registry: WatchFolderRegistry::new(test_settings()),
        }
    }

    pub fn with_creator(creator: Arc<dyn JobCreator>) -> Self {
        let harness = Self::new();
        harness.registry.set_job_creator(creator);
        harness
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config for the inbox, enabled, no preset.
    pub fn folder_config(&self) -> WatchFolderConfig {
        WatchFolderConfig::new(&self.inbox)
    }

    pub async fn add_folder(&self, config: WatchFolderConfig) -> WatchFolder {
        self.registry
            .add(config)
            .await
            .expect("Failed to add watch folder")
    }

    /// Adds the inbox with a preset and arms it.
    pub async fn add_armed_folder(&self, preset_id: &str) -> WatchFolder {
        let folder = self
            .add_folder(self.folder_config().with_preset(preset_id))
            .await;
        let outcome = self.registry.arm(&folder.id).await.expect("folder exists");
        assert!(outcome.success, "arming failed: {:?}", outcome.block_reasons);
        self.registry.get(&folder.id).await.expect("folder exists")
    }

    /// Writes a file below the inbox, creating parent directories.
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.inbox.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    pub async fn folder(&self, id: &str) -> WatchFolder {
        self.registry.get(id).await.expect("folder exists")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_settings() -> WatcherSettings {
    WatcherSettings {
        debounce_ms: 200,
        poll_interval_ms: Some(100),
        ..WatcherSettings::default()
    }
}

/// Everything currently buffered on a trace receiver.
pub fn drain_trace(rx: &mut broadcast::Receiver<TraceRecord>) -> Vec<TraceRecord> {
    let mut records = Vec::new();
    while let Ok(record) = rx.try_recv() {
        records.push(record);
    }
    records
}

pub fn events_of(records: &[TraceRecord], event: TraceEvent) -> Vec<&TraceRecord> {
    records.iter().filter(|r| r.event == event).collect()
}

/// Everything currently buffered on an event receiver.
pub fn drain_events(rx: &mut broadcast::Receiver<WatchFolderEvent>) -> Vec<WatchFolderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Waits for the next trace record of the given kind.
pub async fn next_trace(
    rx: &mut broadcast::Receiver<TraceRecord>,
    event: TraceEvent,
) -> TraceRecord {
    tokio::time::timeout(FS_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(record) if record.event == event => return record,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("trace channel closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", event))
}
