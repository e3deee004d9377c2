use std::path::PathBuf;

use thiserror::Error;

use crate::mounts::Availability;

/// Error surface for the daemon runtime. Every variant is fatal to the process.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse mount table {path}: {source}")]
    MountTable {
        path: PathBuf,
        #[source]
        source: procfs_core::ProcError,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("configuration error: {0}")]
    Core(#[from] bootmirror_core::CoreError),

    /// The watcher lost events (kernel queue overflow); the trees may differ.
    #[error("watcher dropped events, rescan required")]
    EventsLost,

    #[error("mirror unavailable: {0}")]
    Unavailable(Availability),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
