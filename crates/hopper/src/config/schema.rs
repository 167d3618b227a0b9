use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Configuration used to add a watch folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFolderConfig {
    /// Absolute path of the directory to watch.
    pub path: PathBuf,

    /// Whether a watcher should be running.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether to watch subdirectories recursively.
    #[serde(default)]
    pub recursive: bool,

    /// Job preset applied to files from this folder. Required to arm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,

    /// Accepted extensions (".mov" or "mov"). Empty means the default media set.
    #[serde(default)]
    pub include_extensions: Vec<String>,

    /// Glob patterns for paths that are never surfaced.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl WatchFolderConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            recursive: false,
            preset_id: None,
            include_extensions: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn with_preset(mut self, preset_id: impl Into<String>) -> Self {
        self.preset_id = Some(preset_id.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Partial update for an existing watch folder. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFolderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,

    /// `Some(None)` clears the preset; an explicit `null` deserializes to that.
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub preset_id: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_extensions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,
}

impl WatchFolderPatch {
    pub fn preset(preset_id: impl Into<String>) -> Self {
        Self {
            preset_id: Some(Some(preset_id.into())),
            ..Default::default()
        }
    }

    pub fn clear_preset() -> Self {
        Self {
            preset_id: Some(None),
            ..Default::default()
        }
    }

    /// True if applying this patch changes what the watcher observes.
    pub fn touches_watch(&self) -> bool {
        self.path.is_some()
            || self.enabled.is_some()
            || self.recursive.is_some()
            || self.include_extensions.is_some()
            || self.exclude_patterns.is_some()
    }
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Tuning for the underlying file-system watchers and channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherSettings {
    /// Quiescence window before a file is reported, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Poll interval in milliseconds. When set, a polling watcher is used
    /// instead of the native backend (network shares, containers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Capacity of the folder event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Capacity of the audit trace broadcast channel.
    #[serde(default = "default_trace_capacity")]
    pub trace_capacity: usize,
}

impl WatcherSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: None,
            event_capacity: default_event_capacity(),
            trace_capacity: default_trace_capacity(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopperConfig {
    #[serde(default)]
    pub settings: WatcherSettings,

    #[serde(default)]
    pub folders: Vec<WatchFolderConfig>,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    256
}

fn default_trace_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_config_defaults() {
        let config: WatchFolderConfig = serde_json::from_str(r#"{"path": "/media/in"}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("/media/in"));
        assert!(config.enabled);
        assert!(!config.recursive);
        assert!(config.preset_id.is_none());
        assert!(config.include_extensions.is_empty());
        assert!(config.exclude_patterns.is_empty());
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let absent: WatchFolderPatch = serde_json::from_str(r#"{"recursive": true}"#).unwrap();
        assert_eq!(absent.preset_id, None);
        assert_eq!(absent.recursive, Some(true));

        let cleared: WatchFolderPatch = serde_json::from_str(r#"{"presetId": null}"#).unwrap();
        assert_eq!(cleared.preset_id, Some(None));

        let set: WatchFolderPatch = serde_json::from_str(r#"{"presetId": "prores-hq"}"#).unwrap();
        assert_eq!(set.preset_id, Some(Some("prores-hq".to_string())));
    }

    #[test]
    fn test_patch_touches_watch() {
        assert!(!WatchFolderPatch::preset("p").touches_watch());
        assert!(WatchFolderPatch {
            recursive: Some(true),
            ..Default::default()
        }
        .touches_watch());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = WatcherSettings::default();
        assert_eq!(settings.debounce(), Duration::from_secs(2));
        assert!(settings.poll_interval().is_none());
        assert_eq!(settings.event_capacity, 256);
    }
}
