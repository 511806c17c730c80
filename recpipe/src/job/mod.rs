//! Job engine: the unit of asynchronous work and the containers that run it.
//!
//! A [`Job`] is started and run by exactly one [`JobContainer`], which the
//! [`JobManager`] allocates. The container owns the task, the cancellation
//! signal and the listener list; the job only implements its body.
//!
//! Every container emits exactly one [`JobEventKind::Complete`] event,
//! whatever path `run` takes (finished, gave up, stopped or panicked).

mod container;
mod context;
mod manager;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

pub use container::JobContainer;
pub use context::JobContext;
pub use manager::JobManager;

/// Default interval between run-loop iterations.
pub const DEFAULT_SLEEP_TIME: Duration = Duration::from_secs(1);

/// Identity of a job, assigned when its container is allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Running,
    Complete,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Created => write!(f, "Created"),
            JobState::Running => write!(f, "Running"),
            JobState::Complete => write!(f, "Complete"),
            JobState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// How a job ended.
///
/// `Skipped` separates "never produced anything" (a readiness gate that was
/// never satisfied) from an actual failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
        exit_code: Option<i32>,
    },
}

impl JobOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            exit_code: None,
        }
    }

    pub fn tool_failed(reason: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Failed {
            reason: reason.into(),
            exit_code,
        }
    }

    /// Cancellation is reported as a failure of the invocation.
    pub fn stopped() -> Self {
        Self::failed("stopped")
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Succeeded => write!(f, "succeeded"),
            JobOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            JobOutcome::Failed {
                reason,
                exit_code: Some(code),
            } => write!(f, "failed (exit code {code}): {reason}"),
            JobOutcome::Failed { reason, .. } => write!(f, "failed: {reason}"),
        }
    }
}

/// Kind of a job event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventKind {
    /// Informational progress; consumers only log these.
    Update,
    /// Terminal event, emitted once per started container.
    Complete(JobOutcome),
}

/// An event emitted by a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub source: JobId,
    pub job_name: &'static str,
    pub kind: JobEventKind,
    pub message: String,
}

impl JobEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self.kind, JobEventKind::Complete(_))
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        match &self.kind {
            JobEventKind::Complete(outcome) => Some(outcome),
            JobEventKind::Update => None,
        }
    }
}

/// A unit of asynchronous work.
///
/// `start` arms the job and must not block. `run` is the body; it loops on
/// [`JobContext::tick`] until it is done or the context is cancelled, and
/// returns its outcome instead of emitting the terminal event itself. Errors
/// never escape `run`: they are logged and folded into the outcome.
///
/// Stopping is driven from the container: it cancels the context token, which
/// ends the run loop and kills any process spawned through
/// [`ExternalProcess::spawn`](crate::process::ExternalProcess::spawn).
#[async_trait]
pub trait Job: Send + 'static {
    /// Short name for logs and events.
    fn name(&self) -> &'static str;

    /// Interval between run-loop iterations.
    fn sleep_time(&self) -> Duration {
        DEFAULT_SLEEP_TIME
    }

    /// Arm the job before `run`.
    fn start(&mut self, _ctx: &JobContext) -> Result<()> {
        Ok(())
    }

    /// Execute the job.
    async fn run(&mut self, ctx: &JobContext) -> JobOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_predicates() {
        assert!(JobOutcome::Succeeded.is_success());
        assert!(JobOutcome::skipped("not ready").is_skipped());
        assert!(JobOutcome::tool_failed("exit", Some(7)).is_failure());
        assert!(JobOutcome::stopped().is_failure());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(JobOutcome::Succeeded.to_string(), "succeeded");
        assert_eq!(
            JobOutcome::tool_failed("ffmpeg", Some(7)).to_string(),
            "failed (exit code 7): ffmpeg"
        );
        assert_eq!(JobOutcome::skipped("gate").to_string(), "skipped: gate");
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(JobOutcome::tool_failed("x", Some(2))).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["exit_code"], 2);
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
