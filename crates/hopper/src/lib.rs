pub mod broadcast;
pub mod config;
pub mod error;
pub mod folder;
pub mod jobs;
pub mod registry;
pub mod telemetry;
pub mod watch;

pub use broadcast::{event_names, TraceEvent, TraceLogger, TraceRecord, WatchFolderBroadcaster, WatchFolderEvent};
pub use config::{
    default_config_path, load_config, load_config_from_str, HopperConfig, WatchFolderConfig,
    WatchFolderPatch, WatcherSettings,
};
pub use error::{ConfigError, HopperError, JobCreationError, Result, WatchError};
pub use folder::{
    ArmBlockReason, ArmOutcome, ArmValidation, PendingFile, WatchFolder, WatchFolderCounts,
    WatchFolderStatus,
};
pub use jobs::{AutoJobOutcome, JobCreator};
pub use registry::{disarm_reasons, WatchFolderRegistry};
pub use telemetry::{init_tracing, LogFormat};
