//! Preconditions for switching a folder into automatic job creation.

use serde::{Deserialize, Serialize};

use crate::folder::model::{WatchFolder, WatchFolderStatus};

/// Why a folder may not be armed. Several can apply at once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmBlockReason {
    NoPreset,
    Paused,
    AlreadyArmed,
    WatcherError,
}

impl std::fmt::Display for ArmBlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArmBlockReason::NoPreset => write!(f, "NO_PRESET"),
            ArmBlockReason::Paused => write!(f, "PAUSED"),
            ArmBlockReason::AlreadyArmed => write!(f, "ALREADY_ARMED"),
            ArmBlockReason::WatcherError => write!(f, "WATCHER_ERROR"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmValidation {
    pub can_arm: bool,
    pub block_reasons: Vec<ArmBlockReason>,
}

/// Result of an arm request, returned to the caller instead of an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_reasons: Vec<ArmBlockReason>,
}

impl ArmOutcome {
    pub fn armed() -> Self {
        Self {
            success: true,
            block_reasons: Vec::new(),
        }
    }

    pub fn blocked(block_reasons: Vec<ArmBlockReason>) -> Self {
        Self {
            success: false,
            block_reasons,
        }
    }
}

pub fn validate_arm(folder: &WatchFolder) -> ArmValidation {
    let mut block_reasons = Vec::new();

    if !folder.has_preset() {
        block_reasons.push(ArmBlockReason::NoPreset);
    }
    if !folder.enabled || folder.status == WatchFolderStatus::Paused {
        block_reasons.push(ArmBlockReason::Paused);
    }
    if folder.armed {
        block_reasons.push(ArmBlockReason::AlreadyArmed);
    }
    if folder.has_error() {
        block_reasons.push(ArmBlockReason::WatcherError);
    }

    ArmValidation {
        can_arm: block_reasons.is_empty(),
        block_reasons,
    }
}
