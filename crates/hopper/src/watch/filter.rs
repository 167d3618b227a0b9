//! Include/exclude rules deciding which detected paths become pending files.

use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use tracing::debug;

use crate::config::loader::compile_patterns;
use crate::error::ConfigError;

/// Accepted when a folder's include list is empty.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    ".mov", ".mp4", ".mxf", ".avi", ".mkv", ".r3d", ".braw", ".ari", ".dng", ".dpx", ".exr",
];

/// Hidden and system files, always excluded in addition to a folder's own patterns.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] =
    &["._*", ".DS_Store", "Thumbs.db", ".Spotlight-V100", ".Trashes"];

#[derive(Debug, Clone)]
pub struct FileFilter {
    /// Lowercased, dot-prefixed extensions.
    extensions: Vec<String>,
    exclude_patterns: Vec<Pattern>,
    /// Watched folder. Relative patterns only see the part of a path below it.
    root: Option<PathBuf>,
}

impl FileFilter {
    pub fn new(
        include_extensions: &[String],
        exclude_patterns: &[String],
    ) -> Result<Self, ConfigError> {
        let mut extensions: Vec<String> = include_extensions
            .iter()
            .filter_map(|ext| normalize_extension(ext))
            .collect();
        if extensions.is_empty() {
            extensions = DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect();
        }

        let mut patterns = compile_patterns(exclude_patterns)?;
        for default in DEFAULT_EXCLUDE_PATTERNS {
            if let Ok(pattern) = Pattern::new(default) {
                patterns.push(pattern);
            }
        }

        Ok(Self {
            extensions,
            exclude_patterns: patterns,
            root: None,
        })
    }

    /// Anchors exclude matching at the watched folder, so the folder's own
    /// ancestors never trigger a relative pattern.
    pub fn rooted_at(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// True if the path should be surfaced as a detection.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.is_excluded(path) {
            return false;
        }
        self.matches_extension(path)
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            debug!("Could not get filename for: {}", path.display());
            return false;
        };
        let filename = filename.to_lowercase();

        self.extensions.iter().any(|ext| filename.ends_with(ext))
    }

    /// Absolute patterns match the whole path. Relative patterns match the
    /// path below the root, or any single component of it, so `.Trashes`
    /// also hides everything below a `.Trashes` directory.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = self
            .root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        for pattern in &self.exclude_patterns {
            let excluded = if pattern.as_str().starts_with('/') {
                pattern.matches_path(path)
            } else {
                pattern.matches_path(relative)
                    || relative.components().any(|component| match component {
                        Component::Normal(name) => name.to_str().is_some_and(|n| pattern.matches(n)),
                        _ => false,
                    })
            };

            if excluded {
                debug!("Path '{}' excluded by pattern '{}'", path.display(), pattern);
                return true;
            }
        }
        false
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext == "." {
        return None;
    }
    if ext.starts_with('.') {
        Some(ext)
    } else {
        Some(format!(".{}", ext))
    }
}
