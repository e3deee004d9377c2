//! Mount table inspection and the availability check.
//!
//! A root counts as mounted when the mount governing it (the entry with the
//! longest mount point containing the path) is neither `/` nor a pseudo
//! filesystem. An empty directory left behind after an unmount is governed
//! by the parent filesystem and fails the check.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use procfs_core::{FromBufRead, ProcResult};

use serde::Serialize;

use bootmirror_core::Config;
use bootmirror_sync::notifier::{
    SUBJECT_BACKUP_MISSING, SUBJECT_BACKUP_NOT_MOUNTED, SUBJECT_PRIMARY_NOT_MOUNTED,
};
use bootmirror_sync::{Notifier, Severity};

use crate::error::{io_err, DaemonError};

/// Filesystem types that never count as durable storage.
pub const PSEUDO_FS_TYPES: &[&str] = &[
    "rootfs", "tmpfs", "devtmpfs", "efivarfs", "efivars", "overlay",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    pub fn is_pseudo(&self) -> bool {
        PSEUDO_FS_TYPES.contains(&self.fs_type.as_str())
    }
}

/// Parsed `/proc/self/mounts` (fstab format).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        Self::read(BufReader::new(file)).map_err(|source| DaemonError::MountTable {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Field escapes (`\040` for a space) are decoded by procfs.
    pub fn read<R: BufRead>(reader: R) -> ProcResult<Self> {
        let entries = Vec::<procfs_core::MountEntry>::from_buf_read(reader)?
            .into_iter()
            .map(|entry| MountEntry {
                device: entry.fs_spec,
                mount_point: PathBuf::from(entry.fs_file),
                fs_type: entry.fs_vfstype,
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn parse(text: &str) -> ProcResult<Self> {
        Self::read(text.as_bytes())
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    /// The entry whose mount point is the longest prefix of `path`.
    /// For stacked mounts on the same point, the later (visible) one wins.
    pub fn governing_mount(&self, path: &Path) -> Option<&MountEntry> {
        let mut best: Option<&MountEntry> = None;
        for entry in &self.entries {
            if !path.starts_with(&entry.mount_point) {
                continue;
            }
            let depth = entry.mount_point.components().count();
            if best.map_or(true, |b| depth >= b.mount_point.components().count()) {
                best = Some(entry);
            }
        }
        best
    }

    /// True when `path` lives on a real, non-root mount.
    pub fn is_real_mount(&self, path: &Path) -> bool {
        match self.governing_mount(path) {
            Some(entry) => entry.mount_point != Path::new("/") && !entry.is_pseudo(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    PrimaryNotMounted,
    BackupMissing,
    BackupNotMounted,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn alert_subject(&self) -> Option<&'static str> {
        match self {
            Availability::Available => None,
            Availability::PrimaryNotMounted => Some(SUBJECT_PRIMARY_NOT_MOUNTED),
            Availability::BackupMissing => Some(SUBJECT_BACKUP_MISSING),
            Availability::BackupNotMounted => Some(SUBJECT_BACKUP_NOT_MOUNTED),
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Availability::Available => "available",
            Availability::PrimaryNotMounted => "primary not mounted",
            Availability::BackupMissing => "backup destination missing",
            Availability::BackupNotMounted => "backup destination not a mount",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityChecker {
    primary_root: PathBuf,
    backup_root: PathBuf,
    mount_table: PathBuf,
}

impl AvailabilityChecker {
    pub fn new(
        primary_root: impl Into<PathBuf>,
        backup_root: impl Into<PathBuf>,
        mount_table: impl Into<PathBuf>,
    ) -> Self {
        Self {
            primary_root: primary_root.into(),
            backup_root: backup_root.into(),
            mount_table: mount_table.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.primary_root.clone(),
            config.backup_root.clone(),
            config.mount_table.clone(),
        )
    }

    /// Evaluate both roots against the live mount table. No side effects.
    pub fn check_report(&self) -> Availability {
        let table = match MountTable::load(&self.mount_table) {
            Ok(table) => table,
            Err(err) => {
                tracing::error!(error = %err, "Error while checking mount status");
                return Availability::PrimaryNotMounted;
            }
        };

        if !table.is_real_mount(&resolve(&self.primary_root)) {
            return Availability::PrimaryNotMounted;
        }
        if !self.backup_root.exists() {
            return Availability::BackupMissing;
        }
        if !table.is_real_mount(&resolve(&self.backup_root)) {
            return Availability::BackupNotMounted;
        }
        Availability::Available
    }

    /// [`Self::check_report`], logging and alerting on failure.
    pub fn check_available(&self, notifier: &Notifier) -> Availability {
        let report = self.check_report();
        let Some(subject) = report.alert_subject() else {
            return report;
        };
        let message = match report {
            Availability::PrimaryNotMounted => format!(
                "Boot drive is not mounted at {}",
                self.primary_root.display()
            ),
            Availability::BackupMissing => format!(
                "Destination location ({}) does not exist",
                self.backup_root.display()
            ),
            _ => format!(
                "Destination location ({}) is not properly mounted",
                self.backup_root.display()
            ),
        };
        tracing::error!("{message}");
        notifier.notify(subject, &message, Severity::Alert);
        report
    }
}

/// Symlinks resolved; a path that cannot be resolved is used as given.
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
