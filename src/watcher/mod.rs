//! File watching and the rebuild loop.
//!
//! # Architecture
//!
//! ```text
//! BuildSupervisor
//!   - PathWatcher (notify, parent directories)
//!   - WatchSet (reconciled after every scan)
//!   - Debouncer (single restartable deadline)
//!   - Builder -> EventBroadcaster, ArtifactWriter
//! ```

mod backend;
mod debouncer;
mod error;
mod supervisor;
mod watch_set;

pub use backend::{FsEvent, FsEventKind, NotifyWatcher, PathWatcher};
pub use debouncer::Debouncer;
pub use error::WatchError;
pub use supervisor::{BuildSupervisor, DEFAULT_DEBOUNCE_MS, SupervisorHandle, SupervisorState};
pub use watch_set::{Reconciliation, WatchDiff, WatchSet, diff, reconcile};
