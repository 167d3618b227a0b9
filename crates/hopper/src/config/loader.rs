use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::config::schema::{HopperConfig, WatchFolderConfig};
use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "hopper.yaml";

/// Default location of the configuration file (`<config dir>/hopper/hopper.yaml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hopper").join(CONFIG_FILE_NAME))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HopperConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content).map_err(|e| match e {
        ConfigError::ParseYaml { message, .. } => ConfigError::ParseYaml {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Parses YAML (or JSON) configuration content.
pub fn load_config_from_str(content: &str) -> Result<HopperConfig, ConfigError> {
    let config: HopperConfig = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &HopperConfig) -> Result<(), ConfigError> {
    if config.settings.debounce_ms == 0 {
        return Err(ConfigError::Validation {
            message: "debounceMs must be greater than zero".to_string(),
        });
    }

    if config.settings.poll_interval_ms == Some(0) {
        return Err(ConfigError::Validation {
            message: "pollIntervalMs must be greater than zero".to_string(),
        });
    }

    if config.settings.event_capacity == 0 || config.settings.trace_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "channel capacities must be greater than zero".to_string(),
        });
    }

    let mut paths = HashSet::new();
    for folder in &config.folders {
        validate_folder_config(folder)?;

        if !paths.insert(&folder.path) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate watch folder path: {}", folder.path.display()),
            });
        }
    }

    Ok(())
}

/// Checks a single folder configuration before it reaches the registry.
pub fn validate_folder_config(config: &WatchFolderConfig) -> Result<(), ConfigError> {
    validate_path(&config.path)?;

    if let Some(preset_id) = &config.preset_id {
        validate_preset_id(preset_id)?;
    }

    compile_patterns(&config.exclude_patterns)?;

    Ok(())
}

pub(crate) fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if !path.is_absolute() {
        return Err(ConfigError::RelativePath(path.to_path_buf()));
    }
    Ok(())
}

pub(crate) fn validate_preset_id(preset_id: &str) -> Result<(), ConfigError> {
    if preset_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "presetId must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Compiles glob patterns, failing on the first invalid one.
pub(crate) fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_config() {
        let yaml = r#"
settings:
  debounceMs: 500
  pollIntervalMs: 1000
folders:
  - path: /media/camera-a
    recursive: true
    presetId: prores-proxy
    includeExtensions: [".mov", "mxf"]
  - path: /media/camera-b
    enabled: false
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.settings.debounce_ms, 500);
        assert_eq!(config.settings.poll_interval_ms, Some(1000));
        assert_eq!(config.folders.len(), 2);
        assert!(config.folders[0].recursive);
        assert_eq!(config.folders[0].preset_id.as_deref(), Some("prores-proxy"));
        assert!(!config.folders[1].enabled);
    }

    #[test]
    fn test_load_json_config() {
        let json = r#"{"folders": [{"path": "/media/in", "excludePatterns": ["*.tmp"]}]}"#;
        let config = load_config_from_str(json).unwrap();
        assert_eq!(config.folders[0].exclude_patterns, vec!["*.tmp".to_string()]);
        assert_eq!(config.settings.debounce_ms, 2000);
    }

    #[test]
    fn test_rejects_relative_path() {
        let err = load_config_from_str("folders:\n  - path: media/in\n").unwrap_err();
        assert!(matches!(err, ConfigError::RelativePath(_)));
    }

    #[test]
    fn test_rejects_invalid_pattern() {
        let yaml = "folders:\n  - path: /media/in\n    excludePatterns: ['[unclosed']\n";
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_rejects_duplicate_paths() {
        let yaml = "folders:\n  - path: /media/in\n  - path: /media/in\n";
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let err = load_config_from_str("settings:\n  debounceMs: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_rejects_blank_preset() {
        let yaml = "folders:\n  - path: /media/in\n    presetId: '  '\n";
        assert!(load_config_from_str(yaml).is_err());
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "folders:\n  - path: /media/in\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.folders.len(), 1);
    }

    #[test]
    fn test_load_config_parse_error_carries_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "folders: [unterminated").unwrap();

        match load_config(&path).unwrap_err() {
            ConfigError::ParseYaml { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/nonexistent/hopper.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
