//! Normalized filesystem change notifications.
//!
//! A [`ChangeEvent`] carries a *set* of kinds for one path, the way inotify
//! reports a mask: `Create` and `IsDir` arrive together for a new directory.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    /// A file opened for writing was closed.
    CloseWrite,
    /// An entry was moved into the watched tree (or renamed onto this path).
    MovedTo,
    /// An entry was moved away from this path.
    MovedFrom,
    /// An entry inside a watched directory was deleted.
    Delete,
    /// A watched directory itself was deleted.
    DeleteSelf,
    Create,
    /// Flag: the subject of the event is a directory.
    IsDir,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::CloseWrite => "close-write",
            ChangeKind::MovedTo => "moved-to",
            ChangeKind::MovedFrom => "moved-from",
            ChangeKind::Delete => "delete",
            ChangeKind::DeleteSelf => "delete-self",
            ChangeKind::Create => "create",
            ChangeKind::IsDir => "is-dir",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kinds: BTreeSet<ChangeKind>,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kinds: impl IntoIterator<Item = ChangeKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            path: path.into(),
        }
    }

    pub fn has(&self, kind: ChangeKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn has_any(&self, kinds: &[ChangeKind]) -> bool {
        kinds.iter().any(|k| self.kinds.contains(k))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Comma-separated kind list for log lines.
    pub fn kinds_label(&self) -> String {
        self.kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
