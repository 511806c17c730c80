//! recpipe library crate.
//!
//! Post-processing of finished recordings: commercial detection, screenshot
//! extraction, remux/transcode into delivery formats, and scheduled cleanup
//! of live segments. Each step is a [`job::Job`] wrapping external tools,
//! chained by a [`worker::Worker`].

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod job;
pub mod logging;
pub mod maintenance;
pub mod pipeline;
pub mod process;
pub mod worker;

pub use catalog::{InMemoryCatalog, RecordingCatalog};
pub use config::PostProcessConfig;
pub use domain::{Packaging, Recording, RecordingInfo, RecordingMetadata};
pub use error::{Error, Result};
pub use job::{
    Job, JobContainer, JobContext, JobEvent, JobEventKind, JobId, JobManager, JobOutcome,
};
pub use maintenance::{CleanupJob, SegmentCleaner, SweepReport};
pub use worker::{PipelineKind, Worker, WorkerEvent};
