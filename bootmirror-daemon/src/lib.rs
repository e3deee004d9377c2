//! Mirror daemon runtime: availability checks, watcher adapter and the
//! monitoring loop.

mod error;
pub mod mounts;
mod runtime;
pub mod watcher;

pub use error::DaemonError;
pub use mounts::{Availability, AvailabilityChecker, MountEntry, MountTable};
pub use runtime::{init_tracing, monitor, run, run_until, start_blocking, sync_once};
