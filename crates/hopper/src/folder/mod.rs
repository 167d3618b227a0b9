//! Watch folder entity, its counters and its arming rules.

pub mod arming;
pub mod counts;
pub mod model;

pub use arming::{validate_arm, ArmBlockReason, ArmOutcome, ArmValidation};
pub use counts::WatchFolderCounts;
pub use model::{PendingFile, WatchFolder, WatchFolderStatus};
