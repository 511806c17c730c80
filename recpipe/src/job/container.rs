//! Container owning the execution task of exactly one job.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::context::{JobContext, Listeners};
use super::{Job, JobEvent, JobId, JobOutcome, JobState};
use crate::{Error, Result};

/// Runs one [`Job`] on its own task.
///
/// `start` may be called once; `stop` any number of times, from any thread,
/// before, during or after the run.
pub struct JobContainer {
    id: JobId,
    name: &'static str,
    sleep_time: Duration,
    job: Mutex<Option<Box<dyn Job>>>,
    parent: CancellationToken,
    token: Mutex<CancellationToken>,
    state: Arc<Mutex<JobState>>,
    listeners: Listeners,
    handle: Mutex<Option<JoinHandle<JobOutcome>>>,
}

impl JobContainer {
    pub(super) fn new(job: Box<dyn Job>, parent: CancellationToken) -> Self {
        let token = parent.child_token();
        Self {
            id: JobId::new(),
            name: job.name(),
            sleep_time: job.sleep_time(),
            job: Mutex::new(Some(job)),
            parent,
            token: Mutex::new(token),
            state: Arc::new(Mutex::new(JobState::Created)),
            listeners: Listeners::default(),
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    /// Register a listener for this container's events.
    ///
    /// Register before [`start`](Self::start) to be sure to see every event.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        self.listeners.register()
    }

    /// Spawn the task that calls `job.start()` then `job.run()`.
    ///
    /// Must be called from within a tokio runtime. Starting resets the
    /// termination signal, so a `stop()` issued before `start()` does not
    /// prevent the run.
    pub fn start(&self) -> Result<()> {
        let Some(mut job) = self.job.lock().take() else {
            return Err(Error::invalid_transition(self.state(), JobState::Running));
        };

        let token = self.parent.child_token();
        *self.token.lock() = token.clone();
        *self.state.lock() = JobState::Running;

        let ctx = JobContext::new(
            self.id,
            self.name,
            token,
            self.sleep_time,
            self.listeners.clone(),
        );
        let state = self.state.clone();

        info!(job = self.name, id = %self.id, "Starting job");

        let handle = tokio::spawn(async move {
            let outcome = match job.start(&ctx) {
                Ok(()) => AssertUnwindSafe(job.run(&ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        error!(job = ctx.name(), id = %ctx.id(), "Job panicked");
                        JobOutcome::failed("job panicked")
                    }),
                Err(e) => {
                    error!(job = ctx.name(), id = %ctx.id(), error = %e, "Job failed to start");
                    JobOutcome::failed(format!("start failed: {e}"))
                }
            };

            *state.lock() = if ctx.is_stopped() {
                JobState::Stopped
            } else {
                JobState::Complete
            };

            info!(job = ctx.name(), id = %ctx.id(), outcome = %outcome, "Job finished");
            ctx.complete(outcome.clone());
            outcome
        });

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Signal the job to stop and kill its active process, if any.
    pub fn stop(&self) {
        debug!(job = self.name, id = %self.id, "Stopping job");
        self.token.lock().cancel();
    }

    /// Whether the job task has finished (or was never started).
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Wait for the job task and return its outcome.
    ///
    /// Returns `None` if the container was never started or was already
    /// joined.
    pub async fn join(&self) -> Option<JobOutcome> {
        let handle = self.handle.lock().take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(job = self.name, id = %self.id, error = %e, "Job task failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for JobContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContainer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
