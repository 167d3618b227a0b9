use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HopperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Watch folder path must be absolute: {0}")]
    RelativePath(PathBuf),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseYaml {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

/// Failures of the underlying file-system watch.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create watcher for '{path}': {message}")]
    Create { path: PathBuf, message: String },

    #[error("Failed to watch '{path}': {message}")]
    Watch { path: PathBuf, message: String },

    #[error("Watch path does not exist: {0}")]
    PathNotFound(PathBuf),
}

/// Returned by a [`JobCreator`](crate::jobs::JobCreator) that failed outright.
///
/// A creator that merely declines a file returns `Ok(None)` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobCreationError {
    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Job engine unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

impl From<std::io::Error> for JobCreationError {
    fn from(err: std::io::Error) -> Self {
        JobCreationError::Failed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HopperError>;
