//! Watch backends: the [`PathWatcher`] seam and its `notify` implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::WatchError;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Added,
    Changed,
    Removed,
}

/// A single filesystem notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Adds and removes individual paths from a live watch.
pub trait PathWatcher: Send {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Whether the backend emits its own "added" notification for a path
    /// right after it starts being watched.
    fn announces_additions(&self) -> bool {
        false
    }
}

/// `notify`-backed watcher.
///
/// Watches the parent directory of every path (non-recursively) so files
/// replaced by rename-on-save, or not created yet, still produce events.
/// Directories are reference counted across the paths inside them.
pub struct NotifyWatcher {
    watcher: notify::RecommendedWatcher,
    directories: HashMap<PathBuf, usize>,
}

impl NotifyWatcher {
    /// Create the watcher and the channel its events arrive on.
    pub fn new() -> Result<(Self, mpsc::Receiver<FsEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(100);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate(event) {
                    if tx.blocking_send(fs_event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::error!("[watcher] file watch error: {e}"),
        })?;

        Ok((
            Self {
                watcher,
                directories: HashMap::new(),
            },
            rx,
        ))
    }

    pub fn watched_directories(&self) -> impl Iterator<Item = &Path> {
        self.directories.keys().map(PathBuf::as_path)
    }
}

impl PathWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        let dir = parent_dir(path);
        if let Some(count) = self.directories.get_mut(&dir) {
            *count += 1;
            return Ok(());
        }

        self.watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "watching directory", "{}", dir.display());
        self.directories.insert(dir, 1);
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        let dir = parent_dir(path);
        let Some(count) = self.directories.get_mut(&dir) else {
            return Ok(());
        };

        *count -= 1;
        if *count > 0 {
            return Ok(());
        }

        self.directories.remove(&dir);
        self.watcher
            .unwatch(&dir)
            .map_err(|e| WatchError::PathUnwatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "released directory", "{}", dir.display());
        Ok(())
    }
}

/// Map a `notify` event onto per-path events; access and other kinds are dropped.
fn translate(event: Event) -> Vec<FsEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Added,
        EventKind::Modify(_) => FsEventKind::Changed,
        EventKind::Remove(_) => FsEventKind::Removed,
        _ => return Vec::new(),
    };
    event
        .paths
        .into_iter()
        .map(|path| FsEvent { kind, path })
        .collect()
}

/// Directory to watch for `path` (`.` for bare file names).
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_translate_kinds() {
        let path = PathBuf::from("/api/root.yaml");

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert_eq!(
            translate(created),
            vec![FsEvent::new(FsEventKind::Added, &path)]
        );

        let modified = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.clone());
        assert_eq!(translate(modified)[0].kind, FsEventKind::Changed);

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.clone());
        assert_eq!(translate(removed)[0].kind, FsEventKind::Removed);

        let accessed = Event::new(EventKind::Access(AccessKind::Any)).add_path(path);
        assert!(translate(accessed).is_empty());
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/a/b/c.yaml")), PathBuf::from("/a/b"));
        assert_eq!(parent_dir(Path::new("c.yaml")), PathBuf::from("."));
    }

    #[test]
    fn test_directories_are_reference_counted() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, _rx) = NotifyWatcher::new().unwrap();
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");

        watcher.watch(&a).unwrap();
        watcher.watch(&b).unwrap();
        assert_eq!(watcher.watched_directories().count(), 1);

        watcher.unwatch(&a).unwrap();
        assert_eq!(watcher.watched_directories().count(), 1);

        watcher.unwatch(&b).unwrap();
        assert_eq!(watcher.watched_directories().count(), 0);

        // Unknown paths are ignored.
        watcher.unwatch(&a).unwrap();
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, _rx) = NotifyWatcher::new().unwrap();

        let err = watcher
            .watch(&dir.path().join("absent").join("a.yaml"))
            .unwrap_err();
        assert!(matches!(err, WatchError::PathWatchFailed { .. }));
    }

    #[tokio::test]
    async fn test_write_produces_event() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("api.yaml");
        std::fs::write(&file, "a: 1\n").unwrap();

        let (mut watcher, mut rx) = NotifyWatcher::new().unwrap();
        watcher.watch(&file).unwrap();
        std::fs::write(&file, "a: 2\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(event) if event.path.ends_with("api.yaml") => return Some(event),
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .unwrap();
        assert!(event.is_some());
    }
}
