//! Per-run job context: identity, cancellation, pacing and event emission.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{JobEvent, JobEventKind, JobId, JobOutcome};

/// Registered receivers of one container's events.
#[derive(Debug, Clone, Default)]
pub(super) struct Listeners(Arc<Mutex<Vec<mpsc::UnboundedSender<JobEvent>>>>);

impl Listeners {
    pub(super) fn register(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.lock().push(tx);
        rx
    }

    /// Deliver to every live listener, dropping the ones that went away.
    fn emit(&self, event: JobEvent) {
        self.0.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Handed to [`Job::start`](super::Job::start) and
/// [`Job::run`](super::Job::run).
#[derive(Debug, Clone)]
pub struct JobContext {
    id: JobId,
    name: &'static str,
    token: CancellationToken,
    sleep_time: Duration,
    listeners: Listeners,
}

impl JobContext {
    pub(super) fn new(
        id: JobId,
        name: &'static str,
        token: CancellationToken,
        sleep_time: Duration,
        listeners: Listeners,
    ) -> Self {
        Self {
            id,
            name,
            token,
            sleep_time,
            listeners,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Token cancelled when the job is stopped.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn sleep_time(&self) -> Duration {
        self.sleep_time
    }

    /// Sleep one iteration. Returns `false` once the job has been stopped.
    pub async fn tick(&self) -> bool {
        self.sleep(self.sleep_time).await
    }

    /// Sleep for `duration` unless stopped first. Returns `false` if stopped.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.token.is_cancelled(),
        }
    }

    /// Emit an informational event.
    pub fn update(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(job = self.name, id = %self.id, "{}", message);
        self.listeners.emit(JobEvent {
            source: self.id,
            job_name: self.name,
            kind: JobEventKind::Update,
            message,
        });
    }

    /// Emit the terminal event. Only the container calls this.
    pub(super) fn complete(&self, outcome: JobOutcome) {
        let message = outcome.to_string();
        self.listeners.emit(JobEvent {
            source: self.id,
            job_name: self.name,
            kind: JobEventKind::Complete(outcome),
            message,
        });
    }
}
