//! Cancellable repeating task.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::emitters::cadence::Cadence;
use crate::state::SampledState;

/// A RAII guard that keeps the live task count in sampled state.
#[derive(Debug)]
pub struct LiveTaskGuard {
    state: Arc<SampledState>,
}

impl LiveTaskGuard {
    pub fn new(state: Arc<SampledState>) -> Self {
        state.task_started();
        Self { state }
    }
}

impl Drop for LiveTaskGuard {
    fn drop(&mut self) {
        self.state.task_finished();
    }
}

/// Options for spawning a [`RepeatingTask`].
pub struct TaskBuilder {
    name: String,
    cadence: Cadence,
    max_iterations: Option<u64>,
    tracker: Option<Arc<SampledState>>,
}

impl TaskBuilder {
    /// Stop on its own after `n` iterations.
    pub fn max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Count this task in `state.live_tasks` while it runs.
    pub fn track_in(mut self, state: Arc<SampledState>) -> Self {
        self.tracker = Some(state);
        self
    }

    /// Spawn onto the current tokio runtime.
    ///
    /// `work` runs once per iteration; cancellation is observed between
    /// iterations, never in the middle of one.
    pub fn spawn<F>(self, token: CancellationToken, mut work: F) -> RepeatingTask
    where
        F: FnMut() + Send + 'static,
    {
        let TaskBuilder {
            name,
            cadence,
            max_iterations,
            tracker,
        } = self;

        let guard = tracker.map(LiveTaskGuard::new);
        let task_token = token.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let mut iterations: u64 = 0;

            loop {
                if task_token.is_cancelled() || max_iterations.is_some_and(|max| iterations >= max) {
                    break;
                }

                work();
                iterations += 1;

                if max_iterations.is_some_and(|max| iterations >= max) {
                    break;
                }

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(cadence.next_delay()) => {}
                }
            }

            tracing::debug!(task = %task_name, iterations, "Repeating task stopped");
            iterations
        });

        RepeatingTask { name, token, handle }
    }
}

/// Handle to a spawned repeating unit of work.
#[derive(Debug)]
pub struct RepeatingTask {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<u64>,
}

impl RepeatingTask {
    pub fn builder(name: impl Into<String>, cadence: Cadence) -> TaskBuilder {
        TaskBuilder {
            name: name.into(),
            cadence,
            max_iterations: None,
            tracker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request the task to stop after its current iteration.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end. Returns the number of completed iterations.
    pub async fn join(self) -> u64 {
        match self.handle.await {
            Ok(iterations) => iterations,
            Err(e) => {
                tracing::warn!(task = %self.name, error = %e, "Repeating task did not complete cleanly");
                0
            }
        }
    }

    /// Cancel and wait.
    pub async fn stop(self) -> u64 {
        self.cancel();
        self.join().await
    }

    pub(crate) fn into_parts(self) -> (String, JoinHandle<u64>) {
        (self.name, self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_stops_at_iteration_limit() {
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let task = RepeatingTask::builder("limited", Cadence::Fixed(Duration::from_millis(1)))
            .max_iterations(5)
            .spawn(CancellationToken::new(), move || {
                c.fetch_add(1, Ordering::Relaxed);
            });

        assert_eq!(task.join().await, 5);
        assert_eq!(count.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_cancel_ends_long_sleep() {
        let task = RepeatingTask::builder("sleepy", Cadence::Fixed(Duration::from_secs(3600)))
            .spawn(CancellationToken::new(), || {});

        tokio::time::sleep(Duration::from_millis(20)).await;
        let iterations = tokio::time::timeout(Duration::from_secs(1), task.stop())
            .await
            .expect("cancellation should interrupt the sleep");
        assert_eq!(iterations, 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let task = RepeatingTask::builder("never", Cadence::Fixed(Duration::from_millis(1)))
            .spawn(token, || panic!("must not run"));
        assert_eq!(task.join().await, 0);
    }

    #[tokio::test]
    async fn test_live_task_tracking() {
        let state = SampledState::new();
        let task = RepeatingTask::builder("tracked", Cadence::Fixed(Duration::from_millis(5)))
            .track_in(state.clone())
            .spawn(CancellationToken::new(), || {});
        assert_eq!(state.live_tasks(), 1);

        task.stop().await;
        assert_eq!(state.live_tasks(), 0);
    }
}
