//! The mirror service object and its file actions.
//!
//! [`Mirror`] owns everything that is process-wide: the path mapper, the
//! dry-run flag, the mutation gate and the notifier. Each action below is one
//! independent backup-tree mutation; callers decide how to report failures.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use bootmirror_core::{Config, PathMapper};

use crate::error::{io_err, SyncError};
use crate::gate::MutationGate;
use crate::notifier::{AlertChannel, Notifier, NotifyOutcome, Severity};

// ---------------------------------------------------------------------------
// Action outcome
// ---------------------------------------------------------------------------

/// Outcome of an individual mirror action. Paths are backup-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Synced { path: PathBuf },
    WouldSync { path: PathBuf },
    Removed { path: PathBuf },
    WouldRemove { path: PathBuf },
    RemovedTree { path: PathBuf },
    WouldRemoveTree { path: PathBuf },
    CreatedDir { path: PathBuf },
    WouldCreateDir { path: PathBuf },
    /// Nothing to remove: the backup entry was already gone.
    Absent { path: PathBuf },
    /// The path matches an exclusion pattern and was left alone.
    Excluded { path: PathBuf },
}

impl ActionOutcome {
    /// True when the action changed, or in dry-run would have changed, the backup tree.
    pub fn is_change(&self) -> bool {
        !matches!(
            self,
            ActionOutcome::Absent { .. } | ActionOutcome::Excluded { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Mirror {
    mapper: PathMapper,
    dry_run: bool,
    gate: MutationGate,
    notifier: Notifier,
}

impl Mirror {
    pub fn new(mapper: PathMapper, dry_run: bool, notifier: Notifier) -> Self {
        Self {
            mapper,
            dry_run,
            gate: MutationGate::new(),
            notifier,
        }
    }

    pub fn from_config(config: &Config, channel: Box<dyn AlertChannel>) -> Self {
        let notifier = Notifier::new(channel, config.notification_cooldown(), config.dry_run);
        Self::new(PathMapper::from_config(config), config.dry_run, notifier)
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Raise a rate-limited alert.
    pub fn alert(&self, subject: &str, message: &str) -> NotifyOutcome {
        self.notifier.notify(subject, message, Severity::Alert)
    }

    fn rel(&self, path: &Path) -> String {
        self.mapper.display_relative(path)
    }

    // -----------------------------------------------------------------------
    // Copy
    // -----------------------------------------------------------------------

    /// Copy `src` over its backup counterpart, preserving mtime and mode bits.
    pub fn sync_file(&self, src: &Path) -> Result<ActionOutcome, SyncError> {
        let dst = self.mapper.backup_path_for(src)?;
        if self.mapper.is_excluded(src) {
            return Ok(ActionOutcome::Excluded { path: dst });
        }

        let _guard = self.gate.enter();
        if self.dry_run {
            tracing::info!("- DRY RUN - Would sync: {}", self.rel(src));
            return Ok(ActionOutcome::WouldSync { path: dst });
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        if fs::symlink_metadata(&dst).is_ok_and(|m| m.is_dir()) {
            fs::remove_dir_all(&dst).map_err(|e| io_err(&dst, e))?;
            tracing::info!("Replaced directory with file: {}", self.rel(&dst));
        }
        copy_preserving_times(src, &dst)?;
        tracing::info!("Synced: {}", self.rel(src));
        Ok(ActionOutcome::Synced { path: dst })
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    /// Remove the backup counterpart of `primary`, then prune now-empty
    /// ancestor directories up to (not including) the backup root.
    ///
    /// A backup entry that turns out to be a directory is removed as a tree.
    pub fn remove_file(&self, primary: &Path) -> Result<ActionOutcome, SyncError> {
        let backup = self.mapper.backup_path_for(primary)?;
        if self.mapper.is_excluded(&backup) {
            return Ok(ActionOutcome::Excluded { path: backup });
        }

        let _guard = self.gate.enter();
        let meta = match fs::symlink_metadata(&backup) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ActionOutcome::Absent { path: backup })
            }
            Err(e) => return Err(io_err(&backup, e)),
        };

        if self.dry_run {
            tracing::info!("- DRY RUN - Would remove: {}", self.rel(&backup));
            return Ok(ActionOutcome::WouldRemove { path: backup });
        }

        if meta.is_dir() {
            fs::remove_dir_all(&backup).map_err(|e| io_err(&backup, e))?;
        } else {
            fs::remove_file(&backup).map_err(|e| io_err(&backup, e))?;
        }
        tracing::info!("Removed: {}", self.rel(&backup));

        self.prune_empty_ancestors(&backup);
        Ok(ActionOutcome::Removed { path: backup })
    }

    /// Best effort: stops silently at the first non-empty or unreadable directory.
    fn prune_empty_ancestors(&self, backup: &Path) {
        let root = self.mapper.backup_root();
        let mut parent = backup.parent();
        while let Some(dir) = parent {
            if dir == root || !dir.starts_with(root) {
                break;
            }
            let empty = match fs::read_dir(dir) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => break,
            };
            if !empty || fs::remove_dir(dir).is_err() {
                break;
            }
            tracing::debug!("Removed empty directory: {}", dir.display());
            parent = dir.parent();
        }
    }

    /// Recursively remove the backup subtree mapped from `primary`.
    pub fn remove_tree(&self, primary: &Path) -> Result<ActionOutcome, SyncError> {
        let backup = self.mapper.backup_path_for(primary)?;
        if self.mapper.is_excluded(&backup) {
            return Ok(ActionOutcome::Excluded { path: backup });
        }

        let _guard = self.gate.enter();
        let meta = match fs::symlink_metadata(&backup) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ActionOutcome::Absent { path: backup })
            }
            Err(e) => return Err(io_err(&backup, e)),
        };

        if self.dry_run {
            tracing::info!("- DRY RUN - Would remove directory: {}", self.rel(&backup));
            return Ok(ActionOutcome::WouldRemoveTree { path: backup });
        }

        if meta.is_dir() {
            fs::remove_dir_all(&backup).map_err(|e| io_err(&backup, e))?;
        } else {
            fs::remove_file(&backup).map_err(|e| io_err(&backup, e))?;
        }
        tracing::info!("Removed directory: {}", self.rel(&backup));
        Ok(ActionOutcome::RemovedTree { path: backup })
    }

    // -----------------------------------------------------------------------
    // Directories
    // -----------------------------------------------------------------------

    /// Create the backup directory mapped from `primary`.
    ///
    /// Idempotent. A non-directory already occupying the backup path is
    /// replaced.
    pub fn create_dir(&self, primary: &Path) -> Result<ActionOutcome, SyncError> {
        let backup = self.mapper.backup_path_for(primary)?;
        if self.mapper.is_excluded(&backup) {
            return Ok(ActionOutcome::Excluded { path: backup });
        }

        let _guard = self.gate.enter();
        if self.dry_run {
            tracing::debug!("- DRY RUN - Would create directory: {}", self.rel(primary));
            return Ok(ActionOutcome::WouldCreateDir { path: backup });
        }
        if fs::symlink_metadata(&backup).is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(&backup).map_err(|e| io_err(&backup, e))?;
            tracing::info!("Replaced file with directory: {}", self.rel(&backup));
        }
        fs::create_dir_all(&backup).map_err(|e| io_err(&backup, e))?;
        tracing::debug!("Created directory: {}", self.rel(primary));
        Ok(ActionOutcome::CreatedDir { path: backup })
    }

    // -----------------------------------------------------------------------
    // Orphans (backup-side paths)
    // -----------------------------------------------------------------------

    pub(crate) fn remove_orphan_file(&self, backup: &Path) -> Result<ActionOutcome, SyncError> {
        let _guard = self.gate.enter();
        fs::remove_file(backup).map_err(|e| io_err(backup, e))?;
        tracing::info!("Removed orphaned file: {}", self.rel(backup));
        Ok(ActionOutcome::Removed {
            path: backup.to_path_buf(),
        })
    }

    /// Removes `backup` only if it is empty; a non-empty directory is `Absent`.
    pub(crate) fn remove_orphan_dir(&self, backup: &Path) -> Result<ActionOutcome, SyncError> {
        let _guard = self.gate.enter();
        let empty = fs::read_dir(backup)
            .map_err(|e| io_err(backup, e))?
            .next()
            .is_none();
        if !empty {
            return Ok(ActionOutcome::Absent {
                path: backup.to_path_buf(),
            });
        }
        fs::remove_dir(backup).map_err(|e| io_err(backup, e))?;
        tracing::info!("Removed orphaned directory: {}", self.rel(backup));
        Ok(ActionOutcome::RemovedTree {
            path: backup.to_path_buf(),
        })
    }
}

/// `fs::copy` carries the permission bits; access and modification times are
/// copied afterwards.
fn copy_preserving_times(src: &Path, dst: &Path) -> Result<(), SyncError> {
    let meta = fs::metadata(src).map_err(|e| io_err(src, e))?;
    fs::copy(src, dst).map_err(|e| io_err(dst, e))?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dst, atime, mtime).map_err(|e| io_err(dst, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::DispatchError;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Silent;

    impl AlertChannel for Silent {
        fn dispatch(&self, _: &str, _: &str, _: Severity) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        primary: PathBuf,
        backup: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let primary = dir.path().join("boot");
            let backup = dir.path().join("backup");
            fs::create_dir_all(&primary).unwrap();
            fs::create_dir_all(&backup).unwrap();
            Self {
                _dir: dir,
                primary,
                backup,
            }
        }

        fn mirror(&self, dry_run: bool) -> Mirror {
            let mapper = PathMapper::new(
                &self.primary,
                &self.backup,
                vec!["System Volume Information".to_string()],
            );
            let notifier = Notifier::new(Box::new(Silent), Duration::from_secs(300), dry_run);
            Mirror::new(mapper, dry_run, notifier)
        }
    }

    #[test]
    fn sync_creates_parents_and_preserves_mtime() {
        let fx = Fixture::new();
        let src = fx.primary.join("config").join("network.cfg");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"IPADDR=10.0.0.2\n").unwrap();
        let pinned = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, pinned).unwrap();

        let outcome = fx.mirror(false).sync_file(&src).unwrap();
        let dst = fx.backup.join("config").join("network.cfg");
        assert_eq!(outcome, ActionOutcome::Synced { path: dst.clone() });
        assert_eq!(fs::read(&dst).unwrap(), b"IPADDR=10.0.0.2\n");
        let meta = fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), pinned);
    }

    #[cfg(unix)]
    #[test]
    fn sync_preserves_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        let src = fx.primary.join("go");
        fs::write(&src, b"#!/bin/bash\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).unwrap();

        fx.mirror(false).sync_file(&src).unwrap();
        let mode = fs::metadata(fx.backup.join("go")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn dry_run_sync_writes_nothing() {
        let fx = Fixture::new();
        let src = fx.primary.join("a.cfg");
        fs::write(&src, b"x").unwrap();

        let outcome = fx.mirror(true).sync_file(&src).unwrap();
        assert!(matches!(outcome, ActionOutcome::WouldSync { .. }));
        assert!(!fx.backup.join("a.cfg").exists());
    }

    #[test]
    fn excluded_source_is_untouched() {
        let fx = Fixture::new();
        let dir = fx.primary.join("System Volume Information");
        fs::create_dir_all(&dir).unwrap();
        let src = dir.join("WPSettings.dat");
        fs::write(&src, b"x").unwrap();

        let outcome = fx.mirror(false).sync_file(&src).unwrap();
        assert!(matches!(outcome, ActionOutcome::Excluded { .. }));
        assert!(!fx.backup.join("System Volume Information").exists());
    }

    #[test]
    fn remove_prunes_empty_ancestors_but_not_the_root() {
        let fx = Fixture::new();
        let nested = fx.backup.join("config").join("plugins");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("x.plg"), b"x").unwrap();

        let outcome = fx
            .mirror(false)
            .remove_file(&fx.primary.join("config").join("plugins").join("x.plg"))
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Removed { .. }));
        assert!(!fx.backup.join("config").exists(), "empty ancestors pruned");
        assert!(fx.backup.exists(), "backup root must survive");
    }

    #[test]
    fn remove_stops_pruning_at_non_empty_directory() {
        let fx = Fixture::new();
        let config = fx.backup.join("config");
        fs::create_dir_all(config.join("plugins")).unwrap();
        fs::write(config.join("plugins").join("x.plg"), b"x").unwrap();
        fs::write(config.join("ident.cfg"), b"x").unwrap();

        fx.mirror(false)
            .remove_file(&fx.primary.join("config").join("plugins").join("x.plg"))
            .unwrap();
        assert!(!config.join("plugins").exists());
        assert!(config.join("ident.cfg").exists());
    }

    #[test]
    fn remove_missing_is_absent() {
        let fx = Fixture::new();
        let outcome = fx.mirror(false).remove_file(&fx.primary.join("gone")).unwrap();
        assert!(matches!(outcome, ActionOutcome::Absent { .. }));
        assert!(!outcome.is_change());
    }

    #[test]
    fn remove_file_on_directory_entry_removes_the_tree() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.backup.join("moved").join("deep")).unwrap();
        fs::write(fx.backup.join("moved").join("deep").join("f"), b"x").unwrap();

        fx.mirror(false).remove_file(&fx.primary.join("moved")).unwrap();
        assert!(!fx.backup.join("moved").exists());
    }

    #[test]
    fn dry_run_remove_keeps_file() {
        let fx = Fixture::new();
        fs::write(fx.backup.join("keep"), b"x").unwrap();
        let outcome = fx.mirror(true).remove_file(&fx.primary.join("keep")).unwrap();
        assert!(matches!(outcome, ActionOutcome::WouldRemove { .. }));
        assert!(fx.backup.join("keep").exists());
    }

    #[test]
    fn remove_tree_deletes_subtree() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.backup.join("extra").join("a")).unwrap();
        fs::write(fx.backup.join("extra").join("a").join("b"), b"x").unwrap();

        let outcome = fx.mirror(false).remove_tree(&fx.primary.join("extra")).unwrap();
        assert!(matches!(outcome, ActionOutcome::RemovedTree { .. }));
        assert!(!fx.backup.join("extra").exists());
    }

    #[test]
    fn create_dir_is_idempotent() {
        let fx = Fixture::new();
        let m = fx.mirror(false);
        let primary = fx.primary.join("a").join("b");
        m.create_dir(&primary).unwrap();
        m.create_dir(&primary).unwrap();
        assert!(fx.backup.join("a").join("b").is_dir());
    }

    #[test]
    fn sync_replaces_directory_on_backup_path() {
        let fx = Fixture::new();
        let src = fx.primary.join("b.cfg");
        fs::write(&src, b"b").unwrap();
        fs::create_dir_all(fx.backup.join("b.cfg").join("blocker")).unwrap();

        fx.mirror(false).sync_file(&src).unwrap();
        assert_eq!(fs::read(fx.backup.join("b.cfg")).unwrap(), b"b");
    }

    #[test]
    fn create_dir_replaces_file_on_backup_path() {
        let fx = Fixture::new();
        fs::write(fx.backup.join("plugins"), b"stray").unwrap();

        let outcome = fx.mirror(false).create_dir(&fx.primary.join("plugins")).unwrap();
        assert!(matches!(outcome, ActionOutcome::CreatedDir { .. }));
        assert!(fx.backup.join("plugins").is_dir());
    }

    #[test]
    fn outside_root_is_an_error() {
        let fx = Fixture::new();
        let err = fx
            .mirror(false)
            .sync_file(Path::new("/definitely/elsewhere"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Core(_)), "got: {err}");
    }
}
