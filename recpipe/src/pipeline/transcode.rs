//! Transcode to a constrained delivery profile.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{PipelineContext, files, probe, run_tool};
use crate::job::{Job, JobContext, JobOutcome};

/// Long-running single tool run into `.{stem}.{extension}`, then
/// move-or-remove.
pub struct TranscodeJob {
    pipeline: PipelineContext,
}

impl TranscodeJob {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Job for TranscodeJob {
    fn name(&self) -> &'static str {
        "transcode"
    }

    fn sleep_time(&self) -> Duration {
        self.pipeline.config.job.sleep_time()
    }

    async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
        let recording = &self.pipeline.recording;
        let extension = self.pipeline.config.transcode.extension.as_str();
        let hidden = self.pipeline.hidden(extension);

        let vars = self
            .pipeline
            .base_vars()
            .path("input", &recording.source_path())
            .path("output", &hidden);
        let command = match self.pipeline.command(
            "transcode",
            &self.pipeline.config.tools.transcode,
            &vars,
        ) {
            Ok(command) => command,
            Err(outcome) => return outcome,
        };

        let exit = match run_tool(ctx, "transcode", &command).await {
            Ok(exit) => exit,
            Err(outcome) => {
                files::discard(&hidden).await;
                return outcome;
            }
        };

        let duration = probe::parse_duration(&exit.output);
        match files::finalize(&hidden, &recording.file_with_extension(extension)).await {
            Ok(moved) => {
                if moved {
                    recording.set_indexed(extension, duration);
                }
                info!(recording = recording.id(), extension, "Transcode complete");
                JobOutcome::Succeeded
            }
            Err(e) => {
                warn!(error = %e, "Failed to publish transcode output");
                files::discard(&hidden).await;
                JobOutcome::failed(e.to_string())
            }
        }
    }
}
