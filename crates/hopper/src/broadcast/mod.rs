//! Broadcasting modules for real-time state and audit streaming.
//!
//! Both broadcasters are plain `tokio::sync::broadcast` fan-outs so that a
//! desktop shell, a web bridge or a test can subscribe alike.

pub mod folder_events;
pub mod trace;

pub use folder_events::{event_names, WatchFolderBroadcaster, WatchFolderEvent};
pub use trace::{TraceEvent, TraceLogger, TraceRecord};
