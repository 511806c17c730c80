//! Remux with passthrough audio.
//!
//! Three tool runs, strictly in order:
//!
//! 1. source to the hidden intermediate container (`.{stem}.mkv`)
//! 2. edit track flags on the intermediate in place
//! 3. intermediate to the hidden deliverable (`.{stem}.mp4`)
//!
//! The next stage's command is only built once the previous stage has
//! finished successfully. On success the deliverable is renamed to its public
//! name and becomes the recording's indexed file. The intermediate is removed
//! whatever happens; the hidden deliverable is removed on failure.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{PipelineContext, files, probe, run_tool};
use crate::job::{Job, JobContext, JobOutcome};
use crate::process::CommandLine;

/// Stages of the remux chain, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemuxStage {
    Intermediate,
    EditFlags,
    Package,
}

impl RemuxStage {
    pub const FIRST: Self = Self::Intermediate;

    pub fn name(self) -> &'static str {
        match self {
            Self::Intermediate => "remux_intermediate",
            Self::EditFlags => "remux_edit_flags",
            Self::Package => "remux_package",
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Intermediate => Some(Self::EditFlags),
            Self::EditFlags => Some(Self::Package),
            Self::Package => None,
        }
    }
}

impl fmt::Display for RemuxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct RemuxJob {
    pipeline: PipelineContext,
}

impl RemuxJob {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self { pipeline }
    }

    fn command_for(
        &self,
        stage: RemuxStage,
        intermediate: &Path,
        output: &Path,
    ) -> Result<CommandLine, JobOutcome> {
        let tools = &self.pipeline.config.tools;
        let vars = self.pipeline.base_vars();
        let (template, vars) = match stage {
            RemuxStage::Intermediate => (
                &tools.remux_intermediate,
                vars.path("input", &self.pipeline.recording.source_path())
                    .path("output", intermediate),
            ),
            RemuxStage::EditFlags => (
                &tools.remux_edit_flags,
                vars.path("input", intermediate).path("output", intermediate),
            ),
            RemuxStage::Package => (
                &tools.remux_package,
                vars.path("input", intermediate).path("output", output),
            ),
        };
        self.pipeline.command(stage.name(), template, &vars)
    }

    async fn run_stages(
        &self,
        ctx: &JobContext,
        intermediate: &Path,
        output: &Path,
    ) -> JobOutcome {
        let mut duration = None;
        let mut stage = Some(RemuxStage::FIRST);

        while let Some(current) = stage {
            let command = match self.command_for(current, intermediate, output) {
                Ok(command) => command,
                Err(outcome) => return outcome,
            };
            match run_tool(ctx, current.name(), &command).await {
                Ok(exit) => {
                    duration = duration.or_else(|| probe::parse_duration(&exit.output));
                    stage = current.next();
                }
                Err(outcome) => {
                    warn!(
                        recording = self.pipeline.recording.id(),
                        stage = %current,
                        outcome = %outcome,
                        "Remux stage did not complete"
                    );
                    return outcome;
                }
            }
        }

        self.publish(output, duration).await
    }

    async fn publish(&self, output: &Path, duration: Option<f64>) -> JobOutcome {
        let recording = &self.pipeline.recording;
        let extension = &self.pipeline.config.transcode.remux_extension;
        match files::finalize(output, &recording.file_with_extension(extension)).await {
            Ok(true) => {
                recording.set_indexed(extension, duration);
                info!(recording = recording.id(), extension, ?duration, "Remux complete");
                JobOutcome::Succeeded
            }
            Ok(false) => JobOutcome::Succeeded,
            Err(e) => {
                warn!(error = %e, "Failed to publish remux output");
                JobOutcome::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Job for RemuxJob {
    fn name(&self) -> &'static str {
        "remux"
    }

    fn sleep_time(&self) -> Duration {
        self.pipeline.config.job.sleep_time()
    }

    async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
        let transcode = &self.pipeline.config.transcode;
        let intermediate = self.pipeline.hidden(&transcode.intermediate_extension);
        let output = self.pipeline.hidden(&transcode.remux_extension);

        let outcome = self.run_stages(ctx, &intermediate, &output).await;

        files::remove_quietly(&intermediate).await;
        if !outcome.is_success() {
            files::discard(&output).await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut order = Vec::new();
        let mut stage = Some(RemuxStage::FIRST);
        while let Some(current) = stage {
            order.push(current);
            stage = current.next();
        }
        assert_eq!(
            order,
            vec![
                RemuxStage::Intermediate,
                RemuxStage::EditFlags,
                RemuxStage::Package
            ]
        );
    }
}
