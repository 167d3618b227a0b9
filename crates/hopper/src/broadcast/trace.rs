//! Append-only audit trail of watch folder lifecycle events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceEvent {
    Added,
    Enabled,
    Disabled,
    Removed,
    Armed,
    ArmBlocked,
    Disarmed,
    FileDetected,
    AutoJobCreated,
    AutoJobBlocked,
    JobsCreated,
    JobCompleted,
    JobFailed,
    CountsUpdated,
    Error,
    Ready,
}

impl TraceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEvent::Added => "ADDED",
            TraceEvent::Enabled => "ENABLED",
            TraceEvent::Disabled => "DISABLED",
            TraceEvent::Removed => "REMOVED",
            TraceEvent::Armed => "ARMED",
            TraceEvent::ArmBlocked => "ARM_BLOCKED",
            TraceEvent::Disarmed => "DISARMED",
            TraceEvent::FileDetected => "FILE_DETECTED",
            TraceEvent::AutoJobCreated => "AUTO_JOB_CREATED",
            TraceEvent::AutoJobBlocked => "AUTO_JOB_BLOCKED",
            TraceEvent::JobsCreated => "JOBS_CREATED",
            TraceEvent::JobCompleted => "JOB_COMPLETED",
            TraceEvent::JobFailed => "JOB_FAILED",
            TraceEvent::CountsUpdated => "COUNTS_UPDATED",
            TraceEvent::Error => "ERROR",
            TraceEvent::Ready => "READY",
        }
    }
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record. `watch_folder_id` is absent for registry-wide events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub event: TraceEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_folder_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TraceRecord {
    pub fn new(event: TraceEvent, watch_folder_id: Option<&str>, details: Option<Value>) -> Self {
        Self {
            event,
            watch_folder_id: watch_folder_id.map(str::to_string),
            timestamp: Utc::now(),
            details,
        }
    }

    /// Reads a string field from `details`.
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.as_ref()?.get(key)?.as_str()
    }
}

/// Publishes audit records to subscribers and to the `hopper::trace` log target.
/// Records are never read back by the registry.
#[derive(Clone)]
pub struct TraceLogger {
    sender: Arc<broadcast::Sender<TraceRecord>>,
}

impl TraceLogger {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceRecord> {
        self.sender.subscribe()
    }

    pub fn record(&self, event: TraceEvent, watch_folder_id: Option<&str>, details: Option<Value>) {
        let record = TraceRecord::new(event, watch_folder_id, details);
        let rendered = record
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();

        tracing::info!(
            target: "hopper::trace",
            event = %record.event,
            watch_folder_id = record.watch_folder_id.as_deref().unwrap_or("-"),
            details = %rendered,
            "watch folder trace"
        );

        let _ = self.sender.send(record);
    }

    pub fn folder(&self, event: TraceEvent, watch_folder_id: &str, details: Value) {
        self.record(event, Some(watch_folder_id), Some(details));
    }
}

impl Default for TraceLogger {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_receive() {
        let trace = TraceLogger::new(10);
        let mut rx = trace.subscribe();

        trace.folder(
            TraceEvent::Disarmed,
            "folder-1",
            json!({ "reason": "manual" }),
        );

        let record = rx.try_recv().unwrap();
        assert_eq!(record.event, TraceEvent::Disarmed);
        assert_eq!(record.watch_folder_id.as_deref(), Some("folder-1"));
        assert_eq!(record.detail_str("reason"), Some("manual"));
    }

    #[test]
    fn test_registry_wide_record() {
        let trace = TraceLogger::default();
        let mut rx = trace.subscribe();
        trace.record(TraceEvent::Ready, None, None);

        let record = rx.try_recv().unwrap();
        assert!(record.watch_folder_id.is_none());
        assert!(record.detail_str("reason").is_none());
    }

    #[test]
    fn test_record_serialization() {
        let record = TraceRecord::new(
            TraceEvent::AutoJobBlocked,
            Some("folder-1"),
            Some(json!({ "reason": "job_creation_returned_null" })),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "AUTO_JOB_BLOCKED");
        assert_eq!(json["watchFolderId"], "folder-1");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_event_names_match_serde() {
        for event in [
            TraceEvent::ArmBlocked,
            TraceEvent::FileDetected,
            TraceEvent::CountsUpdated,
            TraceEvent::Ready,
        ] {
            let serialized = serde_json::to_string(&event).unwrap();
            assert_eq!(serialized, format!("\"{}\"", event.as_str()));
        }
    }
}
