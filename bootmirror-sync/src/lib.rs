//! # bootmirror-sync
//!
//! The synchronization engine: reconciliation, live event application, the
//! mutation gate and rate-limited alerting.
//!
//! Build one [`Mirror`] per process and share it. Call [`initial_sync`] once
//! to bring the backup tree to parity, then feed every change notification to
//! [`apply_event`].

pub mod apply;
pub mod error;
pub mod gate;
pub mod mirror;
pub mod notifier;
pub mod reconcile;

pub use apply::{apply_event, select_rule, Dispatch, PathState, Rule};
pub use error::SyncError;
pub use gate::MutationGate;
pub use mirror::{ActionOutcome, Mirror};
pub use notifier::{AlertChannel, CommandChannel, DispatchError, Notifier, NotifyOutcome, Severity};
pub use reconcile::{initial_sync, needs_sync, ReconcileReport};
