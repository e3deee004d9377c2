//! Static configuration, read once at process start.
//!
//! # Lookup order
//!
//! ```text
//! --config <path>                      (must exist)
//! <config_dir>/bootmirror/config.yaml  (dirs::config_dir(), if present)
//! /etc/bootmirror/config.yaml          (if present)
//! built-in defaults
//! ```
//!
//! Every field is optional in the YAML file; missing fields take the defaults
//! below. Command-line flags are applied on top by the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

pub const DEFAULT_PRIMARY_ROOT: &str = "/boot";
pub const DEFAULT_BACKUP_ROOT: &str = "/mnt/remotes/local_backups/usb_backup";
pub const DEFAULT_NOTIFY_COMMAND: &str = "/usr/local/emhttp/webGui/scripts/notify";
pub const DEFAULT_MOUNT_TABLE: &str = "/proc/self/mounts";
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

const CONFIG_FILE: &str = "config.yaml";
const SYSTEM_CONFIG: &str = "/etc/bootmirror/config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the tree being mirrored (the boot volume).
    pub primary_root: PathBuf,
    /// Root of the replica.
    pub backup_root: PathBuf,
    /// Substring patterns; any path containing one is never touched.
    pub excluded_patterns: Vec<String>,
    pub dry_run: bool,
    pub debug: bool,
    pub notification_cooldown_secs: u64,
    pub availability_check_interval_secs: u64,
    /// Host notification script invoked for alerts.
    pub notify_command: PathBuf,
    /// Live mount table consulted by the availability check.
    pub mount_table: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_root: PathBuf::from(DEFAULT_PRIMARY_ROOT),
            backup_root: PathBuf::from(DEFAULT_BACKUP_ROOT),
            excluded_patterns: vec!["System Volume Information".to_string()],
            dry_run: false,
            debug: false,
            notification_cooldown_secs: DEFAULT_COOLDOWN_SECS,
            availability_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            notify_command: PathBuf::from(DEFAULT_NOTIFY_COMMAND),
            mount_table: PathBuf::from(DEFAULT_MOUNT_TABLE),
        }
    }
}

impl Config {
    pub fn notification_cooldown(&self) -> Duration {
        Duration::from_secs(self.notification_cooldown_secs)
    }

    pub fn availability_check_interval(&self) -> Duration {
        Duration::from_secs(self.availability_check_interval_secs)
    }

    /// Load configuration following the lookup order in the module docs.
    pub fn load(explicit: Option<&Path>) -> Result<Self, CoreError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load_first_existing(&default_config_paths()),
        }
    }

    /// Parse a single YAML config file.
    ///
    /// Returns `CoreError::ConfigNotFound` if absent,
    /// `CoreError::ConfigParse` (with path + line context) if malformed.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the first candidate that exists, or fall back to defaults.
    pub fn load_first_existing(candidates: &[PathBuf]) -> Result<Self, CoreError> {
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String, CoreError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject configurations that would mirror into the wrong place.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.primary_root.is_absolute() {
            return Err(CoreError::InvalidConfig(format!(
                "primary_root must be absolute: {}",
                self.primary_root.display()
            )));
        }
        if !self.backup_root.is_absolute() {
            return Err(CoreError::InvalidConfig(format!(
                "backup_root must be absolute: {}",
                self.backup_root.display()
            )));
        }
        if self.primary_root == self.backup_root {
            return Err(CoreError::InvalidConfig(
                "primary_root and backup_root are the same path".to_string(),
            ));
        }
        if self.backup_root.starts_with(&self.primary_root) {
            return Err(CoreError::InvalidConfig(format!(
                "backup_root {} is inside primary_root {}",
                self.backup_root.display(),
                self.primary_root.display()
            )));
        }
        if self.primary_root.starts_with(&self.backup_root) {
            return Err(CoreError::InvalidConfig(format!(
                "primary_root {} is inside backup_root {}",
                self.primary_root.display(),
                self.backup_root.display()
            )));
        }
        if self.availability_check_interval_secs == 0 {
            return Err(CoreError::InvalidConfig(
                "availability_check_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.excluded_patterns.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidConfig(
                "excluded_patterns must not contain an empty pattern".to_string(),
            ));
        }
        Ok(())
    }
}

/// Candidate config locations, most specific first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("bootmirror").join(CONFIG_FILE));
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG));
    paths
}
