//! Commercial detection.
//!
//! Runs the detector against the source file, then imports the `{stem}.edl`
//! it leaves behind. The detector's `{stem}.log` and `{stem}.txt` side files
//! are removed whatever the outcome.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{PipelineContext, files, run_tool};
use crate::job::{Job, JobContext, JobOutcome};

/// Side files the detector leaves next to the recording.
const SIDE_FILE_EXTENSIONS: [&str; 2] = ["log", "txt"];

pub struct CommercialJob {
    pipeline: PipelineContext,
}

impl CommercialJob {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self { pipeline }
    }

    async fn detect(&self, ctx: &JobContext) -> JobOutcome {
        let recording = &self.pipeline.recording;
        let vars = self
            .pipeline
            .base_vars()
            .path("input", &recording.source_path());
        let command = match self.pipeline.command(
            "commercial_detect",
            &self.pipeline.config.tools.commercial_detect,
            &vars,
        ) {
            Ok(command) => command,
            Err(outcome) => return outcome,
        };

        if let Err(outcome) = run_tool(ctx, "commercial_detect", &command).await {
            return outcome;
        }

        let edl_path = recording.file_with_extension("edl");
        match edl::read_file(&edl_path, self.pipeline.config.edl.units()) {
            Ok(commercials) => {
                info!(
                    recording = recording.id(),
                    count = commercials.len(),
                    "Imported commercials"
                );
                ctx.update(format!("{} commercial(s) found", commercials.len()));
                recording.set_commercials(commercials);
                JobOutcome::Succeeded
            }
            Err(e) => {
                warn!(path = %edl_path.display(), error = %e, "Failed to read EDL");
                JobOutcome::failed(format!("reading EDL: {e}"))
            }
        }
    }
}

#[async_trait]
impl Job for CommercialJob {
    fn name(&self) -> &'static str {
        "commercial"
    }

    fn sleep_time(&self) -> std::time::Duration {
        self.pipeline.config.job.sleep_time()
    }

    async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
        let outcome = self.detect(ctx).await;

        for ext in SIDE_FILE_EXTENSIONS {
            files::remove_quietly(&self.pipeline.recording.file_with_extension(ext)).await;
        }

        outcome
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::PostProcessConfig;
    use crate::domain::{Commercial, Recording, RecordingInfo, RecordingMetadata};
    use crate::job::JobManager;
    use chrono::Utc;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn recording(dir: &Path) -> Arc<Recording> {
        let now = Utc::now();
        Arc::new(Recording::new(RecordingInfo {
            id: "news".to_string(),
            base_path: dir.join("news"),
            source_extension: "ts".to_string(),
            packaging: Default::default(),
            real_start: now,
            end: now,
            currently_recording: false,
            metadata: RecordingMetadata::default(),
        }))
    }

    fn config(detect: &str) -> Arc<PostProcessConfig> {
        let mut config = PostProcessConfig::default();
        config.job.sleep_time_ms = 10;
        config.tools.commercial_detect = detect.to_string();
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_detector_failure_keeps_metadata_and_cleans_side_files() {
        let dir = TempDir::new().unwrap();
        let rec = recording(dir.path());
        std::fs::write(rec.file_with_extension("log"), b"log").unwrap();
        std::fs::write(rec.file_with_extension("txt"), b"txt").unwrap();
        rec.set_commercials(vec![Commercial::new(1.0, 2.0)]);

        let job = CommercialJob::new(PipelineContext::new(rec.clone(), config("sh -c 'exit 3'")));
        let container = JobManager::new().get_container(job);
        container.start().unwrap();
        let outcome = container.join().await.unwrap();

        assert_eq!(outcome, JobOutcome::tool_failed("commercial_detect failed", Some(3)));
        assert_eq!(rec.commercials(), vec![Commercial::new(1.0, 2.0)]);
        assert!(!rec.file_with_extension("log").exists());
        assert!(!rec.file_with_extension("txt").exists());
    }

    #[tokio::test]
    async fn test_missing_edl_means_no_commercials() {
        let dir = TempDir::new().unwrap();
        let rec = recording(dir.path());

        let job = CommercialJob::new(PipelineContext::new(rec.clone(), config("true")));
        let container = JobManager::new().get_container(job);
        container.start().unwrap();

        assert_eq!(container.join().await, Some(JobOutcome::Succeeded));
        assert!(rec.commercials().is_empty());
    }
}
