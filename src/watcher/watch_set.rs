//! The set of watched local paths and its reconciliation.
//!
//! Reconciliation is split into a pure [`diff`] and the [`reconcile`] step
//! that applies it through a [`PathWatcher`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::backend::PathWatcher;

/// Local paths currently registered for change notification.
///
/// Membership means "watched"; there is no unwatched-but-known state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchSet {
    paths: BTreeSet<PathBuf>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn to_set(&self) -> BTreeSet<PathBuf> {
        self.paths.clone()
    }
}

impl FromIterator<PathBuf> for WatchSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

/// Paths to start and stop watching.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl WatchDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare the watched set with a freshly scanned one.
pub fn diff(previous: &WatchSet, fresh: &BTreeSet<PathBuf>) -> WatchDiff {
    WatchDiff {
        added: fresh.difference(&previous.paths).cloned().collect(),
        removed: previous.paths.difference(fresh).cloned().collect(),
    }
}

/// Result of applying a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub watch_set: WatchSet,
    /// Whether any path started being watched.
    pub added: bool,
}

/// Bring the watch set in line with `fresh`, issuing watch/unwatch calls.
///
/// The returned set always equals `fresh`. A path the backend refuses to
/// watch is logged and kept, so the next reconciliation does not retry it
/// as an addition.
pub fn reconcile(
    previous: &WatchSet,
    fresh: BTreeSet<PathBuf>,
    watcher: &mut dyn PathWatcher,
) -> Reconciliation {
    let changes = diff(previous, &fresh);

    for path in &changes.removed {
        match watcher.unwatch(path) {
            Ok(()) => crate::log_event!("watcher", "stopped watching", "{}", path.display()),
            Err(e) => tracing::warn!("[watcher] {e}"),
        }
    }

    for path in &changes.added {
        match watcher.watch(path) {
            Ok(()) => crate::log_event!("watcher", "started watching", "{}", path.display()),
            Err(e) => tracing::warn!("[watcher] {e}"),
        }
    }

    Reconciliation {
        watch_set: WatchSet { paths: fresh },
        added: !changes.added.is_empty(),
    }
}
