//! Allocation of job containers.

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Job, JobContainer};

/// Hands out [`JobContainer`]s.
///
/// Every container's stop signal is a child of the manager's, so
/// [`shutdown`](Self::shutdown) stops every job it ever allocated.
#[derive(Debug, Clone, Default)]
pub struct JobManager {
    shutdown: CancellationToken,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a container for `job`. The job is not started.
    pub fn get_container(&self, job: impl Job) -> JobContainer {
        self.get_container_boxed(Box::new(job))
    }

    pub fn get_container_boxed(&self, job: Box<dyn Job>) -> JobContainer {
        JobContainer::new(job, self.shutdown.clone())
    }

    /// Stop every running job.
    pub fn shutdown(&self) {
        info!("Shutting down job manager");
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
