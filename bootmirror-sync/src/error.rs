//! Error types for bootmirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use bootmirror_core::CoreError;

/// All errors that can arise from a single mirror action.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Path mapping failed (the path is not under its root).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
