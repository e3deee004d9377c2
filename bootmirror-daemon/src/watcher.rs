//! Adapter from `notify` events to [`ChangeEvent`]s.
//!
//! The watcher callback runs on notify's own thread and forwards raw results
//! into an unbounded channel; translation happens on the consumer side.

use std::path::Path;

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use bootmirror_core::{ChangeEvent, ChangeKind};

use crate::error::DaemonError;

pub type RawEvents = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Recursively watch `root`. Dropping the returned watcher stops delivery
/// and closes the channel.
pub fn watch(root: &Path) -> Result<(RecommendedWatcher, RawEvents), DaemonError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::debug!(path = %root.display(), "watching primary tree");
    Ok((watcher, event_rx))
}

/// Map one notify event onto zero or more change events.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    use ChangeKind::*;

    let each = |kinds: &[ChangeKind]| -> Vec<ChangeEvent> {
        event
            .paths
            .iter()
            .map(|path| ChangeEvent::new(path.clone(), kinds.iter().copied()))
            .collect()
    };

    match &event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => each(&[CloseWrite]),
        EventKind::Create(CreateKind::Folder) => each(&[Create, IsDir]),
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|path| {
                if path.is_dir() {
                    ChangeEvent::new(path.clone(), [Create, IsDir])
                } else {
                    ChangeEvent::new(path.clone(), [Create])
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(&[MovedFrom]),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(&[MovedTo]),
        // inotify already delivered the From and To halves separately.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let kind = if path.exists() { MovedTo } else { MovedFrom };
                ChangeEvent::new(path.clone(), [kind])
            })
            .collect(),
        EventKind::Remove(RemoveKind::Folder) => each(&[DeleteSelf, IsDir]),
        EventKind::Remove(_) => each(&[Delete]),
        // Content modifications are followed by a close-write.
        _ => Vec::new(),
    }
}
