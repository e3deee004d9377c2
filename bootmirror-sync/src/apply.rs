//! Live event application.
//!
//! Dispatch table, first matching kind rule wins. A rule whose kinds match
//! but whose precondition fails ends dispatch; later rules are not tried.
//!
//! | # | kinds                   | precondition              | action        |
//! |---|-------------------------|---------------------------|---------------|
//! | 1 | close-write OR moved-to | primary is a regular file | sync file     |
//! | 2 | delete OR moved-from    |                           | remove file   |
//! | 3 | delete-self OR moved-from | primary no longer exists | remove tree  |
//! | 4 | create AND is-dir       |                           | create dir    |
//!
//! Rule 3 shares `moved-from` with rule 2, so only `delete-self` ever reaches
//! it. Both rules stay as written.

use std::path::Path;

use bootmirror_core::{ChangeEvent, ChangeKind};

use crate::error::SyncError;
use crate::mirror::{ActionOutcome, Mirror};
use crate::notifier::{SUBJECT_DELETE_FAILURE, SUBJECT_DIRECTORY_FAILURE, SUBJECT_SYNC_FAILURE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    SyncFile,
    RemoveFile,
    RemoveTree,
    CreateDir,
}

impl Rule {
    fn failure_subject(self) -> &'static str {
        match self {
            Rule::SyncFile => SUBJECT_SYNC_FAILURE,
            Rule::RemoveFile | Rule::RemoveTree => SUBJECT_DELETE_FAILURE,
            Rule::CreateDir => SUBJECT_DIRECTORY_FAILURE,
        }
    }
}

/// Primary-side facts the dispatch table depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathState {
    pub is_file: bool,
    pub exists: bool,
}

impl PathState {
    pub fn probe(path: &Path) -> Self {
        Self {
            is_file: path.is_file(),
            exists: path.exists(),
        }
    }
}

/// Result of handing one event to [`apply_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Excluded,
    /// No rule applied.
    Ignored,
    Applied(Rule, ActionOutcome),
    /// The action failed; already logged and alerted.
    Failed(Rule),
}

/// Pure dispatch decision for `event` given the primary path's state.
pub fn select_rule(event: &ChangeEvent, primary: PathState) -> Option<Rule> {
    use ChangeKind::*;

    if event.has_any(&[CloseWrite, MovedTo]) {
        return primary.is_file.then_some(Rule::SyncFile);
    }
    if event.has_any(&[Delete, MovedFrom]) {
        return Some(Rule::RemoveFile);
    }
    if event.has_any(&[DeleteSelf, MovedFrom]) {
        return (!primary.exists).then_some(Rule::RemoveTree);
    }
    if event.has(Create) && event.has(IsDir) {
        return Some(Rule::CreateDir);
    }
    None
}

/// Apply one change notification to the backup tree.
///
/// Never returns an error: failures are logged and raise one rate-limited
/// alert, then the caller moves on to the next event.
pub fn apply_event(mirror: &Mirror, event: &ChangeEvent) -> Dispatch {
    if mirror.mapper().is_excluded(&event.path) {
        return Dispatch::Excluded;
    }

    let Some(rule) = select_rule(event, PathState::probe(&event.path)) else {
        return Dispatch::Ignored;
    };

    let name = event.file_name();
    let result = match rule {
        Rule::SyncFile => {
            tracing::debug!("Detected change: {name}");
            mirror.sync_file(&event.path)
        }
        Rule::RemoveFile => {
            tracing::debug!("Detected deletion: {name}");
            mirror.remove_file(&event.path)
        }
        Rule::RemoveTree => {
            tracing::debug!("Detected directory deletion: {name}");
            mirror.remove_tree(&event.path)
        }
        Rule::CreateDir => mirror.create_dir(&event.path),
    };

    match result {
        Ok(outcome) => Dispatch::Applied(rule, outcome),
        Err(err) => {
            report_failure(mirror, rule, &event.path, &err);
            Dispatch::Failed(rule)
        }
    }
}

fn report_failure(mirror: &Mirror, rule: Rule, path: &Path, err: &SyncError) {
    let rel = mirror.mapper().display_relative(path);
    let verb = match rule {
        Rule::SyncFile => "sync",
        Rule::RemoveFile | Rule::RemoveTree => "remove",
        Rule::CreateDir => "create directory",
    };
    tracing::error!("Error applying {rule:?} to {}: {err}", path.display());
    mirror.alert(rule.failure_subject(), &format!("Failed to {verb} {rel}: {err}"));
}
