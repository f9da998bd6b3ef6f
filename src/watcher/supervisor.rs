//! Watch-driven rebuild loop.
//!
//! ```text
//! fs event -> invalidate cache -> Debouncer -> scan + reconcile -> Builder
//!                                                                   |
//!                         Ready: commit, refresh, write  <----------+
//!                         Errored: build-error           <----------+
//! ```
//!
//! The loop owns the watch set, the debouncer and the build bookkeeping.
//! At most one build is in flight. Every build gets a sequence number when
//! it starts and its result is applied only if no newer build has been
//! applied and no change arrived after it started.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::backend::{FsEvent, NotifyWatcher, PathWatcher};
use super::debouncer::Debouncer;
use super::watch_set::{WatchSet, reconcile};
use super::WatchError;
use crate::broadcast::{BuildEvent, EventBroadcaster};
use crate::build::{BuildArtifact, BuildFailure, Builder};
use crate::reference::ReferenceScanner;
use crate::writer::ArtifactWriter;

/// Default quiet period before rebuilding.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Where the supervisor is in its rebuild cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorState {
    Idle,
    AwaitingDebounce,
    Building,
    Ready(Arc<BuildArtifact>),
    Errored(BuildFailure),
}

impl SupervisorState {
    pub fn label(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::AwaitingDebounce => "awaiting-debounce",
            SupervisorState::Building => "building",
            SupervisorState::Ready(_) => "ready",
            SupervisorState::Errored(_) => "errored",
        }
    }
}

/// A finished build attempt.
#[derive(Debug)]
struct BuildOutcome {
    seq: u64,
    result: Result<BuildArtifact, BuildFailure>,
}

/// Drives rebuilds of one root document from filesystem events.
pub struct BuildSupervisor {
    builder: Arc<Builder>,
    scanner: ReferenceScanner,
    broadcaster: Arc<EventBroadcaster>,
    writer: Option<ArtifactWriter>,
    watcher: Box<dyn PathWatcher>,
    events: mpsc::Receiver<FsEvent>,
    debouncer: Debouncer,
    watch_set: WatchSet,
    /// Swallow the next event: the backend's own notice for a new path.
    skip_next: bool,
    state: Arc<RwLock<SupervisorState>>,
    watched: Arc<RwLock<BTreeSet<PathBuf>>>,
    /// Sequence number of the most recently started build.
    started_seq: u64,
    /// Sequence number of the most recently applied build.
    applied_seq: u64,
    /// Builds numbered below this started before the latest change.
    fresh_from_seq: u64,
    in_flight: bool,
    rebuild_queued: bool,
    completions_tx: mpsc::UnboundedSender<BuildOutcome>,
    completions_rx: mpsc::UnboundedReceiver<BuildOutcome>,
}

impl BuildSupervisor {
    /// Supervise `builder` using an explicit watch backend and event stream.
    pub fn new(
        builder: Arc<Builder>,
        watcher: Box<dyn PathWatcher>,
        events: mpsc::Receiver<FsEvent>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            scanner: builder.scanner(),
            builder,
            broadcaster: Arc::new(EventBroadcaster::new()),
            writer: None,
            watcher,
            events,
            debouncer: Debouncer::new(DEFAULT_DEBOUNCE_MS),
            watch_set: WatchSet::new(),
            skip_next: false,
            state: Arc::new(RwLock::new(SupervisorState::Idle)),
            watched: Arc::new(RwLock::new(BTreeSet::new())),
            started_seq: 0,
            applied_seq: 0,
            fresh_from_seq: 0,
            in_flight: false,
            rebuild_queued: false,
            completions_tx,
            completions_rx,
        }
    }

    /// Supervise `builder` with the `notify` backend.
    pub fn with_notify(builder: Arc<Builder>) -> Result<Self, WatchError> {
        let (watcher, events) = NotifyWatcher::new()?;
        Ok(Self::new(builder, Box::new(watcher), events))
    }

    /// Share an existing broadcaster.
    pub fn with_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Persist every applied artifact through `writer`.
    pub fn with_writer(mut self, writer: ArtifactWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Set the debounce duration in milliseconds.
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.debouncer = Debouncer::new(ms);
        self
    }

    /// Start the loop on the current runtime.
    pub fn spawn(self) -> SupervisorHandle {
        let cancel = CancellationToken::new();
        let builder = self.builder.clone();
        let broadcaster = self.broadcaster.clone();
        let state = self.state.clone();
        let watched = self.watched.clone();
        let task = tokio::spawn(self.run(cancel.clone()));

        SupervisorHandle {
            builder,
            broadcaster,
            state,
            watched,
            cancel,
            task,
        }
    }

    /// Run until `cancel` fires, then release every watch.
    pub async fn run(mut self, cancel: CancellationToken) {
        crate::log_event!(
            "supervisor",
            "started",
            "{} (debounce: {}ms)",
            self.builder.source().display(),
            self.debouncer.duration().as_millis()
        );

        self.ensure_root_watched();
        self.start_cycle().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(event) = self.events.recv() => {
                    self.on_fs_event(event);
                }

                _ = self.debouncer.elapsed(), if self.debouncer.has_pending() => {
                    if self.debouncer.take_ready() {
                        self.on_debounce_elapsed().await;
                    }
                }

                Some(outcome) = self.completions_rx.recv() => {
                    self.on_build_complete(outcome).await;
                }
            }
        }

        self.shutdown();
    }

    fn on_fs_event(&mut self, event: FsEvent) {
        if !self.watch_set.contains(&event.path) {
            crate::debug_event!(
                "supervisor",
                "unmatched",
                "{:?} {}",
                event.kind,
                event.path.display()
            );
            return;
        }

        if self.skip_next {
            self.skip_next = false;
            crate::debug_event!(
                "supervisor",
                "skipped",
                "{:?} {}",
                event.kind,
                event.path.display()
            );
            // A failure stays current until a build replaces it.
            let settled = matches!(*self.state.read(), SupervisorState::Ready(_));
            if settled && !self.in_flight && !self.debouncer.has_pending() {
                self.set_state(SupervisorState::Idle);
            }
            return;
        }

        crate::debug_event!(
            "supervisor",
            "change",
            "{:?} {}",
            event.kind,
            event.path.display()
        );

        // Readers must not see the pre-change artifact from here on.
        self.builder.invalidate();
        self.fresh_from_seq = self.started_seq + 1;
        self.debouncer.schedule();
        self.set_state(SupervisorState::AwaitingDebounce);
    }

    async fn on_debounce_elapsed(&mut self) {
        if self.in_flight {
            crate::debug_event!("supervisor", "build in flight, rebuild queued");
            self.rebuild_queued = true;
            self.set_state(SupervisorState::Building);
            return;
        }
        self.start_cycle().await;
    }

    /// Resync the watch set, then start a build.
    async fn start_cycle(&mut self) {
        let root = self.builder.source().to_path_buf();

        match self.scanner.scan_local(&root).await {
            Ok(mut fresh) => {
                fresh.insert(root);
                let result = reconcile(&self.watch_set, fresh, self.watcher.as_mut());
                self.watch_set = result.watch_set;
                self.publish_watch_set();
                if result.added && self.watcher.announces_additions() {
                    self.skip_next = true;
                }
                self.start_build();
            }
            Err(e) => {
                tracing::warn!("[supervisor] cannot resync watched files: {e}");
                self.ensure_root_watched();
                self.started_seq += 1;
                let outcome = BuildOutcome {
                    seq: self.started_seq,
                    result: Err(BuildFailure::from(e)),
                };
                self.apply(outcome).await;
            }
        }
    }

    fn start_build(&mut self) {
        self.started_seq += 1;
        let seq = self.started_seq;
        self.in_flight = true;
        self.set_state(SupervisorState::Building);

        let builder = self.builder.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = builder.build().await;
            // The loop may have stopped; the result is simply dropped then.
            let _ = tx.send(BuildOutcome { seq, result });
        });
    }

    async fn on_build_complete(&mut self, outcome: BuildOutcome) {
        self.in_flight = false;
        self.apply(outcome).await;

        if self.rebuild_queued {
            self.rebuild_queued = false;
            self.start_cycle().await;
        }
    }

    /// Apply a finished build unless something newer supersedes it.
    async fn apply(&mut self, outcome: BuildOutcome) {
        let BuildOutcome { seq, result } = outcome;

        if seq <= self.applied_seq || seq < self.fresh_from_seq {
            crate::debug_event!("supervisor", "discarded superseded build", "#{seq}");
            return;
        }
        self.applied_seq = seq;

        match result {
            Ok(artifact) => {
                let artifact = self.builder.commit(artifact);
                self.set_state(SupervisorState::Ready(artifact.clone()));
                self.broadcaster.emit(BuildEvent::Refresh);
                if let Some(writer) = &self.writer {
                    writer.write_logged(&artifact).await;
                }
            }
            Err(failure) => {
                self.builder.invalidate();
                let message = failure.to_string();
                self.set_state(SupervisorState::Errored(failure));
                self.broadcaster.emit_failure(message);
            }
        }
    }

    /// Leaving `Errored` clears the replay; entering it is left to
    /// [`EventBroadcaster::emit_failure`].
    fn set_state(&mut self, state: SupervisorState) {
        if !matches!(state, SupervisorState::Errored(_)) {
            self.broadcaster.set_replay(None);
        }
        crate::debug_event!("supervisor", "state", "{}", state.label());
        *self.state.write() = state;
    }

    fn ensure_root_watched(&mut self) {
        let root = self.builder.source();
        if self.watch_set.contains(root) {
            return;
        }
        let mut fresh = self.watch_set.to_set();
        fresh.insert(root.to_path_buf());
        let result = reconcile(&self.watch_set, fresh, self.watcher.as_mut());
        self.watch_set = result.watch_set;
        self.publish_watch_set();
        if result.added && self.watcher.announces_additions() {
            self.skip_next = true;
        }
    }

    fn publish_watch_set(&self) {
        *self.watched.write() = self.watch_set.to_set();
    }

    fn shutdown(&mut self) {
        self.debouncer.cancel_pending();
        self.watch_set = reconcile(&self.watch_set, BTreeSet::new(), self.watcher.as_mut()).watch_set;
        self.publish_watch_set();
        crate::log_event!("supervisor", "stopped");
    }
}

/// Read access to a running supervisor, plus stop.
pub struct SupervisorHandle {
    builder: Arc<Builder>,
    broadcaster: Arc<EventBroadcaster>,
    state: Arc<RwLock<SupervisorState>>,
    watched: Arc<RwLock<BTreeSet<PathBuf>>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// The current artifact, or `None` while none is valid.
    pub fn current_artifact(&self) -> Option<Arc<BuildArtifact>> {
        self.builder.current()
    }

    pub fn state(&self) -> SupervisorState {
        self.state.read().clone()
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    pub fn source(&self) -> &Path {
        self.builder.source()
    }

    /// Paths currently in the watch set.
    pub fn watched_paths(&self) -> BTreeSet<PathBuf> {
        self.watched.read().clone()
    }

    /// Stop the loop, unwatch every path and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("[supervisor] loop ended abnormally: {e}");
        }
    }
}
