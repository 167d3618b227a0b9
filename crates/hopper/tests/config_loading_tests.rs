//! Loading folders from configuration files into a registry.

mod common;

use common::TestHarness;
use hopper::{load_config, ConfigError, HopperError, WatchFolderRegistry, WatchFolderStatus};

#[tokio::test]
async fn test_registry_from_yaml_file() {
    let harness = TestHarness::new();
    let archive = harness.root().join("archive");
    std::fs::create_dir_all(&archive).unwrap();

    let config_path = harness.root().join("hopper.yaml");
    let yaml = format!(
        r#"
settings:
  debounceMs: 250
  pollIntervalMs: 100
folders:
  - path: {inbox}
    presetId: h264
    includeExtensions: [mov, ".MXF"]
  - path: {archive}
    enabled: false
    recursive: true
"#,
        inbox = harness.inbox.display(),
        archive = archive.display(),
    );
    std::fs::write(&config_path, yaml).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.settings.debounce_ms, 250);

    let registry = WatchFolderRegistry::from_config(&config).await.unwrap();
    assert_eq!(registry.settings().poll_interval_ms, Some(100));

    let folders = registry.list().await;
    assert_eq!(folders.len(), 2);

    let inbox = &folders[0];
    assert_eq!(inbox.path, harness.inbox);
    assert_eq!(inbox.preset_id.as_deref(), Some("h264"));
    assert_eq!(inbox.status, WatchFolderStatus::Watching);
    assert!(!inbox.armed);

    let archive_folder = &folders[1];
    assert!(archive_folder.recursive);
    assert_eq!(archive_folder.status, WatchFolderStatus::Paused);

    // Configured folders still have to be armed explicitly.
    assert!(registry.arm(&inbox.id).await.unwrap().success);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_load_appends_to_existing_registry() {
    let harness = TestHarness::new();
    harness.add_folder(harness.folder_config()).await;

    let other = harness.root().join("other");
    std::fs::create_dir_all(&other).unwrap();
    let config = hopper::load_config_from_str(&format!(
        "folders:\n  - path: {}\n",
        other.display()
    ))
    .unwrap();

    let added = harness.registry.load(&config).await.unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(harness.registry.list().await.len(), 2);
}

#[test]
fn test_missing_config_file() {
    let harness = TestHarness::new();
    let result = load_config(harness.root().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
}

#[test]
fn test_config_with_relative_path_is_rejected() {
    let result = hopper::load_config_from_str("folders:\n  - path: media/in\n");
    assert!(matches!(result, Err(ConfigError::RelativePath(_))));
}

#[test]
fn test_config_errors_convert_to_hopper_error() {
    let err: HopperError = ConfigError::Validation {
        message: "bad".to_string(),
    }
    .into();
    assert_eq!(err.to_string(), "Configuration error: Config validation failed: bad");
}
