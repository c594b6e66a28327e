//! A set of emitter tasks sharing one cancellation scope.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::emitters::cadence::Cadence;
use crate::emitters::task::RepeatingTask;
use crate::state::SampledState;

/// Owns the emitter tasks of one harness.
pub struct EmitterGroup {
    token: CancellationToken,
    state: Arc<SampledState>,
    tasks: Vec<RepeatingTask>,
}

/// Outcome of [`EmitterGroup::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupReport {
    /// Iterations completed across all tasks that stopped in time.
    pub iterations: u64,
    /// Tasks aborted after the timeout.
    pub aborted: usize,
}

impl EmitterGroup {
    /// Create a group whose tasks also stop when `parent` is cancelled.
    pub fn new(parent: &CancellationToken, state: Arc<SampledState>) -> Self {
        Self {
            token: parent.child_token(),
            state,
            tasks: Vec::new(),
        }
    }

    /// Spawn a task that runs until the group is shut down.
    pub fn spawn<F>(&mut self, name: impl Into<String>, cadence: Cadence, work: F)
    where
        F: FnMut() + Send + 'static,
    {
        let task = RepeatingTask::builder(name, cadence)
            .track_in(self.state.clone())
            .spawn(self.token.clone(), work);
        tracing::debug!(task = %task.name(), ?cadence, "Emitter started");
        self.tasks.push(task);
    }

    /// Spawn a task that stops on its own after `iterations`.
    pub fn spawn_limited<F>(&mut self, name: impl Into<String>, cadence: Cadence, iterations: u64, work: F)
    where
        F: FnMut() + Send + 'static,
    {
        let task = RepeatingTask::builder(name, cadence)
            .max_iterations(iterations)
            .track_in(self.state.clone())
            .spawn(self.token.clone(), work);
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(RepeatingTask::name).collect()
    }

    /// Wait for every task to end on its own, without cancelling.
    pub async fn join(self) -> u64 {
        join_all(self.tasks.into_iter().map(RepeatingTask::join))
            .await
            .into_iter()
            .sum()
    }

    /// Cancel all tasks and wait for them, aborting any still running after `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> GroupReport {
        self.token.cancel();

        let (names, mut handles): (Vec<String>, Vec<_>) =
            self.tasks.into_iter().map(RepeatingTask::into_parts).unzip();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = GroupReport::default();
        let mut timed_out = false;
        let mut pending: FuturesUnordered<_> = handles.iter_mut().collect();
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some(Ok(iterations))) => report.iterations += iterations,
                Ok(Some(Err(e))) => tracing::error!(error = %e, "Emitter task failed"),
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }
        drop(pending);

        if timed_out {
            for (name, handle) in names.iter().zip(&handles) {
                if !handle.is_finished() {
                    tracing::warn!(task = %name, "Emitter did not stop in time, aborting");
                    handle.abort();
                    report.aborted += 1;
                }
            }
        }
        report
    }
}
