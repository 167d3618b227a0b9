pub mod filter;
pub mod watcher;

pub use filter::{FileFilter, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_MEDIA_EXTENSIONS};
pub use watcher::{FolderWatcher, WatchTarget, WatcherEvent, WatcherEventKind, WatcherToken};
