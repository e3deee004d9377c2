//! Rate-limited host notifications.
//!
//! One cooldown window covers every alert in the process: after a successful
//! dispatch, all further alerts are dropped until the window has elapsed.
//! Dry-run attempts are logged and never move the cooldown timestamp.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

pub const SUBJECT_SYNC_FAILURE: &str = "USB Mirror Error - Sync failure";
pub const SUBJECT_DELETE_FAILURE: &str = "USB Mirror Error - Deletion failure";
pub const SUBJECT_DIRECTORY_FAILURE: &str = "USB Mirror Error - Directory failure";
pub const SUBJECT_PRIMARY_NOT_MOUNTED: &str = "USB Mirror Error - Boot drive not Mounted";
pub const SUBJECT_BACKUP_MISSING: &str = "USB Mirror Error - Backup destination Not Found";
pub const SUBJECT_BACKUP_NOT_MOUNTED: &str = "USB Mirror Error - Backup destination is not a mount";
pub const SUBJECT_CRITICAL: &str = "USB Mirror Critical Error";

/// Event name passed to the host notify script.
pub const SERVICE_NAME: &str = "USB Mirror Service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
    Alert,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Alert => "alert",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The alerting channel does not exist on this host.
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("notification dispatch failed: {0}")]
    Failed(String),
}

/// Host-level alerting side channel.
pub trait AlertChannel: Send + Sync {
    fn dispatch(&self, subject: &str, message: &str, severity: Severity)
        -> Result<(), DispatchError>;
}

/// Runs an external notify script:
/// `<program> -e <event> -s <subject> -d <message> -i <severity>`.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    program: PathBuf,
    event: String,
}

impl CommandChannel {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            event: SERVICE_NAME.to_string(),
        }
    }
}

impl AlertChannel for CommandChannel {
    fn dispatch(
        &self,
        subject: &str,
        message: &str,
        severity: Severity,
    ) -> Result<(), DispatchError> {
        let status = Command::new(&self.program)
            .arg("-e")
            .arg(&self.event)
            .arg("-s")
            .arg(subject)
            .arg("-d")
            .arg(message)
            .arg("-i")
            .arg(severity.as_str())
            .status()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    DispatchError::Unavailable(format!("{} not found", self.program.display()))
                }
                _ => DispatchError::Failed(format!("{}: {e}", self.program.display())),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::Failed(format!(
                "{} exited with {status}",
                self.program.display()
            )))
        }
    }
}

/// What happened to a single `notify` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// Dropped: inside the cooldown window.
    Suppressed,
    /// Logged only.
    DryRun,
    /// The channel rejected it; not retried.
    Failed,
}

pub struct Notifier {
    channel: Box<dyn AlertChannel>,
    cooldown: Duration,
    dry_run: bool,
    last_sent: Mutex<Option<Instant>>,
}

impl Notifier {
    pub fn new(channel: Box<dyn AlertChannel>, cooldown: Duration, dry_run: bool) -> Self {
        Self {
            channel,
            cooldown,
            dry_run,
            last_sent: Mutex::new(None),
        }
    }

    pub fn notify(&self, subject: &str, message: &str, severity: Severity) -> NotifyOutcome {
        self.notify_at(Instant::now(), subject, message, severity)
    }

    /// [`Self::notify`] with an explicit clock reading.
    pub fn notify_at(
        &self,
        now: Instant,
        subject: &str,
        message: &str,
        severity: Severity,
    ) -> NotifyOutcome {
        // Held across check, dispatch and update so two concurrent failures
        // cannot both pass the cooldown.
        let mut last_sent = self
            .last_sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(prev) = *last_sent {
            if now.saturating_duration_since(prev) < self.cooldown {
                tracing::debug!("Notification cooldown active, skipping notification.");
                return NotifyOutcome::Suppressed;
            }
        }

        if self.dry_run {
            tracing::info!("- DRY RUN - Would send notification: [{subject}] {message}");
            return NotifyOutcome::DryRun;
        }

        match self.channel.dispatch(subject, message, severity) {
            Ok(()) => {
                *last_sent = Some(now);
                NotifyOutcome::Sent
            }
            Err(err @ DispatchError::Unavailable(_)) => {
                tracing::warn!("{err}");
                NotifyOutcome::Failed
            }
            Err(err) => {
                tracing::error!("Failed to send notification: {err}");
                NotifyOutcome::Failed
            }
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("cooldown", &self.cooldown)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}
