//! Primary ↔ backup path mapping and the exclusion predicate.
//!
//! Pure, no I/O. The mapper never touches the filesystem; callers decide what
//! to do with the mapped path.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    primary_root: PathBuf,
    backup_root: PathBuf,
    excluded: Vec<String>,
}

impl PathMapper {
    pub fn new(
        primary_root: impl Into<PathBuf>,
        backup_root: impl Into<PathBuf>,
        excluded: Vec<String>,
    ) -> Self {
        Self {
            primary_root: primary_root.into(),
            backup_root: backup_root.into(),
            excluded,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.primary_root.clone(),
            config.backup_root.clone(),
            config.excluded_patterns.clone(),
        )
    }

    pub fn primary_root(&self) -> &Path {
        &self.primary_root
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// True iff any exclusion pattern is a substring of `path`.
    ///
    /// Applied to primary and backup paths alike.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.excluded
            .iter()
            .any(|pattern| text.contains(pattern.as_str()))
    }

    /// `backup_root + relative(primary_path, primary_root)`.
    pub fn backup_path_for(&self, primary_path: &Path) -> Result<PathBuf, CoreError> {
        rebase(primary_path, &self.primary_root, &self.backup_root)
    }

    /// Inverse of [`Self::backup_path_for`].
    pub fn primary_path_for(&self, backup_path: &Path) -> Result<PathBuf, CoreError> {
        rebase(backup_path, &self.backup_root, &self.primary_root)
    }

    /// Path relative to whichever root contains it, for log lines.
    ///
    /// Falls back to the full path when it lies under neither root.
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.primary_root)
            .or_else(|_| path.strip_prefix(&self.backup_root))
            .map(|rel| {
                if rel.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    rel.display().to_string()
                }
            })
            .unwrap_or_else(|_| path.display().to_string())
    }
}

fn rebase(path: &Path, from: &Path, onto: &Path) -> Result<PathBuf, CoreError> {
    let rel = path
        .strip_prefix(from)
        .map_err(|_| CoreError::OutsideRoot {
            path: path.to_path_buf(),
            root: from.to_path_buf(),
        })?;
    if rel.as_os_str().is_empty() {
        return Ok(onto.to_path_buf());
    }
    Ok(onto.join(rel))
}
