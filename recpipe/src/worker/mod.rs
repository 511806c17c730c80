//! Workers: named, reusable pipeline definitions.
//!
//! A [`Worker`] binds a [`PipelineKind`] to a config. Each [`Worker::work`]
//! call runs the pipeline's job chain for one recording on its own task and
//! fires exactly one [`WorkerEvent`] when the chain is over, whatever the
//! outcome.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PostProcessConfig;
use crate::domain::Recording;
use crate::job::{Job, JobContainer, JobEventKind, JobId, JobManager, JobOutcome};
use crate::pipeline::{
    CommercialJob, ConcatJob, PipelineContext, RemuxJob, ScreenshotJob, TranscodeJob,
};
use crate::{Error, Result};

/// The hand-coded pipelines a worker can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Commercial,
    Screenshot,
    Remux,
    Transcode,
}

impl PipelineKind {
    pub const ALL: [Self; 4] = [
        Self::Commercial,
        Self::Screenshot,
        Self::Remux,
        Self::Transcode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commercial => "commercial",
            Self::Screenshot => "screenshot",
            Self::Remux => "remux",
            Self::Transcode => "transcode",
        }
    }

    /// Whether the pipeline reads the single source file, so a segmented
    /// recording has to be joined first. Screenshots read segments directly.
    pub fn needs_single_source(self) -> bool {
        !matches!(self, Self::Screenshot)
    }

    fn job(self, pipeline: PipelineContext) -> Box<dyn Job> {
        match self {
            Self::Commercial => Box::new(CommercialJob::new(pipeline)),
            Self::Screenshot => Box::new(ScreenshotJob::new(pipeline)),
            Self::Remux => Box::new(RemuxJob::new(pipeline)),
            Self::Transcode => Box::new(TranscodeJob::new(pipeline)),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Other(format!("unknown pipeline: {s}")))
    }
}

/// Kind of a worker event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerEventKind {
    Complete,
}

/// Terminal event of one [`Worker::work`] invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerEvent {
    pub kind: WorkerEventKind,
    pub worker: String,
    pub pipeline: PipelineKind,
    pub recording_id: String,
    /// `true` only for [`JobOutcome::Succeeded`].
    pub success: bool,
    pub outcome: JobOutcome,
}

/// Runs one pipeline against recordings.
///
/// Running the same worker twice on the same recording at the same time is
/// the caller's responsibility to avoid: both runs would share temp names.
#[derive(Clone)]
pub struct Worker {
    name: Arc<str>,
    kind: PipelineKind,
    config: Arc<PostProcessConfig>,
    manager: JobManager,
    /// In-flight containers, removed once their terminal event is observed.
    active: Arc<Mutex<HashMap<JobId, Arc<JobContainer>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    stop_token: Arc<Mutex<CancellationToken>>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        kind: PipelineKind,
        config: Arc<PostProcessConfig>,
        manager: JobManager,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            name: Arc::from(name.into()),
            kind,
            config,
            manager,
            active: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            stop_token: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Subscribe to this worker's events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of job containers currently in flight.
    pub fn in_flight(&self) -> usize {
        self.active.lock().len()
    }

    /// Run the pipeline for `recording`.
    ///
    /// The returned handle resolves to the same event broadcast to
    /// subscribers. Must be called from within a tokio runtime.
    pub fn work(&self, recording: Arc<Recording>) -> JoinHandle<WorkerEvent> {
        let token = self.stop_token.lock().child_token();
        let worker = self.clone();
        tokio::spawn(async move { worker.drive(recording, token).await })
    }

    /// Stop every in-flight job and keep pending stages from launching.
    ///
    /// Only affects `work` calls made before this one.
    pub fn stop(&self) {
        info!(worker = %self.name, "Stopping worker");
        let previous = std::mem::replace(&mut *self.stop_token.lock(), CancellationToken::new());
        previous.cancel();
        for container in self.active.lock().values() {
            container.stop();
        }
    }

    async fn drive(&self, recording: Arc<Recording>, token: CancellationToken) -> WorkerEvent {
        let pipeline = PipelineContext::new(recording.clone(), self.config.clone());
        info!(
            worker = %self.name,
            pipeline = %self.kind,
            recording = recording.id(),
            "Starting pipeline"
        );

        let mut outcome = JobOutcome::Succeeded;
        if self.kind.needs_single_source() && ConcatJob::is_needed(&pipeline).await {
            outcome = self
                .run_stage(Box::new(ConcatJob::new(pipeline.clone())), &token)
                .await;
        }
        if outcome.is_success() {
            outcome = self.run_stage(self.kind.job(pipeline), &token).await;
        }

        let event = WorkerEvent {
            kind: WorkerEventKind::Complete,
            worker: self.name.to_string(),
            pipeline: self.kind,
            recording_id: recording.id().to_string(),
            success: outcome.is_success(),
            outcome,
        };

        if event.success {
            info!(worker = %self.name, recording = recording.id(), "Pipeline succeeded");
        } else {
            warn!(
                worker = %self.name,
                recording = recording.id(),
                outcome = %event.outcome,
                "Pipeline did not succeed"
            );
        }

        // No subscribers is fine; the caller still gets the event from the handle.
        let _ = self.event_tx.send(event.clone());
        event
    }

    /// Start one job and wait for its terminal event.
    async fn run_stage(&self, job: Box<dyn Job>, token: &CancellationToken) -> JobOutcome {
        if token.is_cancelled() {
            return JobOutcome::stopped();
        }

        let container = Arc::new(self.manager.get_container_boxed(job));
        let id = container.id();
        let mut events = container.listen();
        self.active.lock().insert(id, container.clone());

        if let Err(e) = container.start() {
            self.active.lock().remove(&id);
            return JobOutcome::failed(e.to_string());
        }

        let mut stop_sent = false;
        let outcome = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) if event.source != id => continue,
                    Some(event) => match event.kind {
                        JobEventKind::Update => {
                            debug!(worker = %self.name, job = event.job_name, "{}", event.message);
                        }
                        JobEventKind::Complete(outcome) => break outcome,
                    },
                    None => {
                        break container
                            .join()
                            .await
                            .unwrap_or_else(|| JobOutcome::failed("job ended without completing"));
                    }
                },
                _ = token.cancelled(), if !stop_sent => {
                    container.stop();
                    stop_sent = true;
                }
            }
        };

        container.join().await;
        self.active.lock().remove(&id);
        outcome
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
