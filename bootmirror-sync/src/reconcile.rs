//! Startup reconciliation ("initial sync").
//!
//! Forward pass: depth-first walk of the primary tree, pruning excluded
//! directories before descending, copying every file whose backup copy is
//! missing or differs in size or mtime. Orphan pass (skipped in dry-run):
//! walk the backup tree and remove entries with no primary counterpart.
//!
//! Per-entry failures are logged, alerted and counted; they never abort
//! the walk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;
use crate::mirror::{ActionOutcome, Mirror};
use crate::notifier::{SUBJECT_DELETE_FAILURE, SUBJECT_DIRECTORY_FAILURE, SUBJECT_SYNC_FAILURE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub synced: usize,
    /// Orphan files removed from the backup tree.
    pub removed: usize,
    pub created_dirs: usize,
    /// Orphan directories removed once empty.
    pub removed_dirs: usize,
    pub failed: usize,
    pub duration_ms: u128,
}

impl ReconcileReport {
    fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            dry_run,
            synced: 0,
            removed: 0,
            created_dirs: 0,
            removed_dirs: 0,
            failed: 0,
            duration_ms: 0,
        }
    }

    /// Files synced or removed (or, in dry-run, that would have been).
    /// Directory bookkeeping is reported separately.
    pub fn changes(&self) -> usize {
        self.synced + self.removed
    }
}

/// Size + mtime heuristic. Any stat failure on either side means "sync".
pub fn needs_sync(primary: &Path, backup: &Path) -> bool {
    let (Ok(p), Ok(b)) = (fs::metadata(primary), fs::metadata(backup)) else {
        return true;
    };
    if !b.is_file() || p.len() != b.len() {
        return true;
    }
    match (p.modified(), b.modified()) {
        (Ok(pm), Ok(bm)) => pm != bm,
        _ => true,
    }
}

/// Bring the backup tree to parity with the primary tree.
pub fn initial_sync(mirror: &Mirror) -> ReconcileReport {
    tracing::info!("Performing initial sync...");
    let started = Instant::now();
    let mut report = ReconcileReport::new(mirror.is_dry_run());

    forward_pass(mirror, &mut report);
    if !mirror.is_dry_run() {
        orphan_pass(mirror, &mut report);
    }

    report.duration_ms = started.elapsed().as_millis();
    tracing::info!(
        "Initial sync completed: {} changes made{}",
        report.changes(),
        if report.failed > 0 {
            format!(" ({} failures)", report.failed)
        } else {
            String::new()
        }
    );
    report
}

// ---------------------------------------------------------------------------
// Forward pass
// ---------------------------------------------------------------------------

fn forward_pass(mirror: &Mirror, report: &mut ReconcileReport) {
    let mapper = mirror.mapper();
    let mut stack = vec![mapper.primary_root().to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Some(entries) = list_dir(&dir, report) else {
            continue;
        };

        for path in entries {
            if mapper.is_excluded(&path) {
                continue;
            }
            if is_real_dir(&path) {
                ensure_backup_dir(mirror, &path, report);
                stack.push(path);
            } else if path.is_file() {
                reconcile_file(mirror, &path, report);
            } else {
                tracing::debug!("Skipping non-regular entry: {}", path.display());
            }
        }
    }
}

fn ensure_backup_dir(mirror: &Mirror, primary: &Path, report: &mut ReconcileReport) {
    let exists = match mirror.mapper().backup_path_for(primary) {
        Ok(backup) => backup.is_dir(),
        Err(_) => false,
    };
    if exists {
        return;
    }
    match mirror.create_dir(primary) {
        Ok(outcome) if outcome.is_change() => report.created_dirs += 1,
        Ok(_) => {}
        Err(err) => record_failure(mirror, report, SUBJECT_DIRECTORY_FAILURE, primary, &err),
    }
}

fn reconcile_file(mirror: &Mirror, primary: &Path, report: &mut ReconcileReport) {
    let backup = match mirror.mapper().backup_path_for(primary) {
        Ok(backup) => backup,
        Err(err) => {
            record_failure(mirror, report, SUBJECT_SYNC_FAILURE, primary, &SyncError::from(err));
            return;
        }
    };
    if !needs_sync(primary, &backup) {
        return;
    }
    match mirror.sync_file(primary) {
        Ok(outcome) if outcome.is_change() => report.synced += 1,
        Ok(_) => {}
        Err(err) => record_failure(mirror, report, SUBJECT_SYNC_FAILURE, primary, &err),
    }
}

// ---------------------------------------------------------------------------
// Orphan pass
// ---------------------------------------------------------------------------

fn orphan_pass(mirror: &Mirror, report: &mut ReconcileReport) {
    let mapper = mirror.mapper();
    let mut stack = vec![mapper.backup_root().to_path_buf()];
    let mut visited_dirs = Vec::new();

    while let Some(dir) = stack.pop() {
        let Some(entries) = list_dir(&dir, report) else {
            continue;
        };
        for path in entries {
            // A primary tree nested under the backup root is never an orphan.
            if mapper.is_excluded(&path) || path.starts_with(mapper.primary_root()) {
                continue;
            }
            if is_real_dir(&path) {
                visited_dirs.push(path.clone());
                stack.push(path);
                continue;
            }
            if has_primary_counterpart(mirror, &path) {
                continue;
            }
            match mirror.remove_orphan_file(&path) {
                Ok(_) => report.removed += 1,
                Err(err) => record_failure(mirror, report, SUBJECT_DELETE_FAILURE, &path, &err),
            }
        }
    }

    // Deepest first so emptied parents can go too.
    visited_dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    for dir in visited_dirs {
        if has_primary_counterpart(mirror, &dir) {
            continue;
        }
        match mirror.remove_orphan_dir(&dir) {
            Ok(ActionOutcome::RemovedTree { .. }) => report.removed_dirs += 1,
            Ok(_) => {}
            Err(err) => record_failure(mirror, report, SUBJECT_DELETE_FAILURE, &dir, &err),
        }
    }
}

fn has_primary_counterpart(mirror: &Mirror, backup: &Path) -> bool {
    match mirror.mapper().primary_path_for(backup) {
        Ok(primary) => primary.exists(),
        // Unmappable paths are never deleted.
        Err(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sorted entries of `dir`, or `None` after logging an unreadable directory.
fn list_dir(dir: &Path, report: &mut ReconcileReport) -> Option<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!("Error reading directory {}: {err}", dir.display());
            report.failed += 1;
            return None;
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(err) => {
                tracing::error!("Error reading entry in {}: {err}", dir.display());
                None
            }
        })
        .collect();
    paths.sort();
    Some(paths)
}

/// Directory that is not a symlink; symlinked directories are not descended.
fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_dir())
        .unwrap_or(false)
}

fn record_failure(
    mirror: &Mirror,
    report: &mut ReconcileReport,
    subject: &str,
    path: &Path,
    err: &SyncError,
) {
    report.failed += 1;
    let rel = mirror.mapper().display_relative(path);
    tracing::error!("Error reconciling {}: {err}", path.display());
    mirror.alert(subject, &format!("Failed to reconcile {rel}: {err}"));
}
