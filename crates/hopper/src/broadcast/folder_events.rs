//! State snapshots and per-folder events for external observers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::folder::{PendingFile, WatchFolder};

/// Event names for hosts that re-emit these events by name.
pub mod event_names {
    pub const STATE_CHANGED: &str = "watch-folders://state-changed";
    pub const FILE_DETECTED: &str = "watch-folders://file-detected";
    pub const ERROR: &str = "watch-folders://error";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WatchFolderEvent {
    /// Full snapshot of every folder, pushed after each mutation.
    #[serde(rename_all = "camelCase")]
    StateChanged { watch_folders: Vec<WatchFolder> },
    #[serde(rename_all = "camelCase")]
    FileDetected {
        watch_folder_id: String,
        file: PendingFile,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        watch_folder_id: String,
        error: String,
    },
}

impl WatchFolderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WatchFolderEvent::StateChanged { .. } => event_names::STATE_CHANGED,
            WatchFolderEvent::FileDetected { .. } => event_names::FILE_DETECTED,
            WatchFolderEvent::Error { .. } => event_names::ERROR,
        }
    }
}

#[derive(Clone)]
pub struct WatchFolderBroadcaster {
    sender: Arc<broadcast::Sender<WatchFolderEvent>>,
}

impl WatchFolderBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: WatchFolderEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchFolderEvent> {
        self.sender.subscribe()
    }

    pub fn state_changed(&self, watch_folders: Vec<WatchFolder>) {
        self.send(WatchFolderEvent::StateChanged { watch_folders });
    }

    pub fn file_detected(&self, watch_folder_id: &str, file: PendingFile) {
        self.send(WatchFolderEvent::FileDetected {
            watch_folder_id: watch_folder_id.to_string(),
            file,
        });
    }

    pub fn error(&self, watch_folder_id: &str, error: &str) {
        self.send(WatchFolderEvent::Error {
            watch_folder_id: watch_folder_id.to_string(),
            error: error.to_string(),
        });
    }
}

impl Default for WatchFolderBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_receive() {
        let broadcaster = WatchFolderBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.file_detected("folder-1", PendingFile::new("/in/clip.mov", 42));

        match rx.try_recv().unwrap() {
            WatchFolderEvent::FileDetected {
                watch_folder_id,
                file,
            } => {
                assert_eq!(watch_folder_id, "folder-1");
                assert_eq!(file.size, 42);
                assert!(file.selected);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_send_without_receivers() {
        let broadcaster = WatchFolderBroadcaster::default();
        broadcaster.error("folder-1", "permission denied");
    }

    #[test]
    fn test_event_serialization() {
        let event = WatchFolderEvent::Error {
            watch_folder_id: "folder-1".to_string(),
            error: "path removed".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["watchFolderId"], "folder-1");
        assert_eq!(event.name(), event_names::ERROR);

        let snapshot = WatchFolderEvent::StateChanged {
            watch_folders: vec![],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["type"], "state-changed");
        assert!(json["watchFolders"].as_array().unwrap().is_empty());
    }
}
