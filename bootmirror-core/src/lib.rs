//! bootmirror core library: configuration, path mapping, change events, errors.
//!
//! Public API surface:
//! - [`config`]: [`Config`] load / validate
//! - [`paths`]: [`PathMapper`] and the exclusion predicate
//! - [`event`]: [`ChangeEvent`] and [`ChangeKind`]
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod event;
pub mod paths;

pub use config::Config;
pub use error::CoreError;
pub use event::{ChangeEvent, ChangeKind};
pub use paths::PathMapper;
