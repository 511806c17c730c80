//! Preview still extraction.
//!
//! The still is taken `offset_secs` into the recording, so the job first
//! waits until that part of the recording exists:
//!
//! - segmented recordings: the segment after the one holding the offset has
//!   appeared (or recording has stopped and the holding segment exists);
//! - single files: wall clock has passed `real_start + offset + margin` and
//!   the source file exists.
//!
//! After the primary still, one still per configured variant is derived from
//! it (`{stem}.{suffix}.{ext}`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::gate::{GateResult, wait_until_ready};
use super::{PipelineContext, files, run_tool};
use crate::domain::Packaging;
use crate::job::{Job, JobContext, JobOutcome};
use crate::process::TemplateVars;

pub struct ScreenshotJob {
    pipeline: PipelineContext,
}

impl ScreenshotJob {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self { pipeline }
    }

    /// Index of the segment holding the screenshot offset.
    fn segment_index(&self) -> u64 {
        let config = &self.pipeline.config.screenshot;
        (config.offset_secs / config.segment_duration_secs).floor().max(0.0) as u64
    }

    pub(crate) fn is_ready(&self, now: DateTime<Utc>) -> bool {
        let recording = &self.pipeline.recording;
        let config = &self.pipeline.config;

        match recording.packaging() {
            Packaging::Segmented => {
                let index = self.segment_index();
                if recording.segment_path(&config.segments, index + 1).exists() {
                    return true;
                }
                !recording.is_recording()
                    && recording.segment_path(&config.segments, index).exists()
            }
            Packaging::SingleFile => {
                let wait = config.screenshot.offset_secs + config.screenshot.margin_secs;
                let due = recording.real_start()
                    + chrono::Duration::milliseconds((wait * 1000.0) as i64);
                now >= due && recording.source_path().exists()
            }
        }
    }

    /// Input file and seek offset within it.
    fn input(&self) -> (PathBuf, f64) {
        let recording = &self.pipeline.recording;
        let config = &self.pipeline.config;
        match recording.packaging() {
            Packaging::Segmented => {
                let index = self.segment_index();
                let offset = config.screenshot.offset_secs
                    - index as f64 * config.screenshot.segment_duration_secs;
                (recording.segment_path(&config.segments, index), offset.max(0.0))
            }
            Packaging::SingleFile => (recording.source_path(), config.screenshot.offset_secs),
        }
    }

    async fn extract(&self, ctx: &JobContext) -> JobOutcome {
        let config = &self.pipeline.config;
        let recording = &self.pipeline.recording;
        let extension = config.screenshot.extension.as_str();

        let (input, offset) = self.input();
        let hidden = self.pipeline.hidden(extension);
        let public = recording.file_with_extension(extension);

        let vars = self
            .pipeline
            .base_vars()
            .path("input", &input)
            .path("output", &hidden)
            .set("offset", format!("{offset:.3}"));
        if let Err(outcome) = self
            .produce(ctx, "screenshot", &config.tools.screenshot, vars, &hidden, &public)
            .await
        {
            return outcome;
        }

        for variant in &config.screenshot.variants {
            let variant_ext = format!("{}.{}", variant.suffix, extension);
            let hidden = self.pipeline.hidden(&variant_ext);
            let variant_public = recording.file_with_extension(&variant_ext);
            let vars = self
                .pipeline
                .base_vars()
                .path("input", &public)
                .path("output", &hidden)
                .set("filter", variant.filter.as_str());
            if let Err(outcome) = self
                .produce(
                    ctx,
                    "screenshot_variant",
                    &config.tools.screenshot_variant,
                    vars,
                    &hidden,
                    &variant_public,
                )
                .await
            {
                return outcome;
            }
        }

        info!(recording = recording.id(), "Screenshots extracted");
        JobOutcome::Succeeded
    }

    /// One tool run into `hidden`, published as `public` on success.
    async fn produce(
        &self,
        ctx: &JobContext,
        stage: &'static str,
        template: &str,
        vars: TemplateVars,
        hidden: &Path,
        public: &Path,
    ) -> Result<(), JobOutcome> {
        let command = self.pipeline.command(stage, template, &vars)?;
        if let Err(outcome) = run_tool(ctx, stage, &command).await {
            files::discard(hidden).await;
            return Err(outcome);
        }
        if let Err(e) = files::finalize(hidden, public).await {
            warn!(error = %e, "Failed to publish screenshot");
            files::discard(hidden).await;
            return Err(JobOutcome::failed(e.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Job for ScreenshotJob {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    fn sleep_time(&self) -> Duration {
        self.pipeline.config.job.sleep_time()
    }

    async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
        let polls = self.pipeline.config.job.readiness_polls;
        match wait_until_ready(ctx, polls, || self.is_ready(Utc::now())).await {
            GateResult::Ready => self.extract(ctx).await,
            GateResult::Stopped => JobOutcome::stopped(),
            GateResult::GaveUp => {
                warn!(
                    recording = self.pipeline.recording.id(),
                    polls, "Screenshot source never became ready"
                );
                JobOutcome::skipped(format!("source not ready after {polls} polls"))
            }
        }
    }
}
