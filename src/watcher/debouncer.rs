//! Debouncing for bursts of file change events.
//!
//! Editors often save several times in quick succession (auto-save,
//! formatting on save). The debouncer holds a single deadline; every
//! [`schedule`](Debouncer::schedule) pushes it back, so only the last event
//! of a burst leads to a rebuild.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// A single restartable, cancellable deadline.
#[derive(Debug)]
pub struct Debouncer {
    /// When the pending trigger fires, if one is pending.
    deadline: Option<Instant>,
    /// Quiet period required before firing.
    duration: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given quiet period in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            deadline: None,
            duration: Duration::from_millis(debounce_ms),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Arm the trigger, replacing any pending one.
    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.duration);
    }

    /// Drop the pending trigger, if any.
    pub fn cancel_pending(&mut self) {
        self.deadline = None;
    }

    /// Check if a trigger is pending.
    pub fn has_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending trigger if its quiet period has elapsed.
    pub fn take_ready(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Resolve once the pending deadline passes; never resolves when idle.
    ///
    /// The deadline is read when called, so a `schedule` after this call is
    /// not observed by the returned future.
    pub fn elapsed(&self) -> impl Future<Output = ()> + use<> {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(50);
        assert!(!debouncer.has_pending());

        debouncer.schedule();

        // Immediately after, nothing should be ready
        assert!(!debouncer.take_ready());
        assert!(debouncer.has_pending());

        advance(Duration::from_millis(60)).await;

        assert!(debouncer.take_ready());
        assert!(!debouncer.has_pending());
        assert!(!debouncer.take_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_resets_on_new_schedule() {
        let mut debouncer = Debouncer::new(50);
        debouncer.schedule();

        advance(Duration::from_millis(30)).await;
        debouncer.schedule();

        // 60ms from the first schedule, only 30ms from the second
        advance(Duration::from_millis(30)).await;
        assert!(!debouncer.take_ready());

        advance(Duration::from_millis(30)).await;
        assert!(debouncer.take_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_cancel() {
        let mut debouncer = Debouncer::new(50);
        debouncer.schedule();
        debouncer.cancel_pending();
        assert!(!debouncer.has_pending());

        advance(Duration::from_millis(100)).await;
        assert!(!debouncer.take_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_waits_for_deadline() {
        let mut debouncer = Debouncer::new(300);
        debouncer.schedule();

        let start = Instant::now();
        debouncer.elapsed().await;
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(debouncer.take_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_never_resolves_when_idle() {
        let debouncer = Debouncer::new(10);
        let result = timeout(Duration::from_secs(5), debouncer.elapsed()).await;
        assert!(result.is_err());
    }
}
