//! Post-processing pipelines.
//!
//! Each pipeline is a [`Job`](crate::job::Job) that runs one or more external
//! tools against a [`Recording`] and then either publishes its output (rename
//! from the hidden working name, update metadata) or discards it.
//!
//! - [`CommercialJob`]: commercial detection, EDL import
//! - [`ScreenshotJob`]: gated still extraction plus resized variants
//! - [`ConcatJob`]: joins a segmented recording into a single source file
//! - [`RemuxJob`]: three-stage remux with passthrough audio
//! - [`TranscodeJob`]: single-stage transcode to a constrained profile

pub mod commercial;
pub mod concat;
pub mod files;
pub mod gate;
pub mod probe;
pub mod remux;
pub mod screenshot;
pub mod transcode;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::config::PostProcessConfig;
use crate::domain::Recording;
use crate::job::{JobContext, JobOutcome};
use crate::process::{CommandLine, CommandTemplate, ExternalProcess, ProcessExit, TemplateVars};

pub use commercial::CommercialJob;
pub use concat::ConcatJob;
pub use remux::RemuxJob;
pub use screenshot::ScreenshotJob;
pub use transcode::TranscodeJob;

/// What every pipeline job works on: one recording and the shared config.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub recording: Arc<Recording>,
    pub config: Arc<PostProcessConfig>,
}

impl PipelineContext {
    pub fn new(recording: Arc<Recording>, config: Arc<PostProcessConfig>) -> Self {
        Self { recording, config }
    }

    /// Placeholders every template may use: tool paths, `{dir}` and `{stem}`.
    pub fn base_vars(&self) -> TemplateVars {
        let tools = &self.config.tools;
        TemplateVars::new()
            .set("ffmpeg", tools.ffmpeg_path.as_str())
            .set("comskip", tools.comskip_path.as_str())
            .set("mkvpropedit", tools.mkvpropedit_path.as_str())
            .path("dir", self.recording.dir())
            .set("stem", self.recording.stem())
    }

    /// Hidden working name for a derived file with `extension`.
    pub fn hidden(&self, extension: &str) -> PathBuf {
        self.recording.hidden_file(&self.config.hidden_prefix, extension)
    }

    /// Render `template` with the configured priority prefix.
    pub fn command(
        &self,
        name: &'static str,
        template: &str,
        vars: &TemplateVars,
    ) -> std::result::Result<CommandLine, JobOutcome> {
        CommandTemplate::new(name, template)
            .render(vars, self.config.priority_prefix.as_deref())
            .map_err(|e| {
                warn!(stage = name, error = %e, "Invalid command template");
                JobOutcome::failed(e.to_string())
            })
    }
}

/// Run one tool to completion under the job's cancellation.
///
/// Returns the exit on success. Every other ending (stopped, spawn failure,
/// non-zero exit) is returned as the outcome the job should report.
pub async fn run_tool(
    ctx: &JobContext,
    stage: &'static str,
    command: &CommandLine,
) -> std::result::Result<ProcessExit, JobOutcome> {
    if ctx.is_stopped() {
        return Err(JobOutcome::stopped());
    }

    ctx.update(format!("{stage}: {command}"));
    let process = ExternalProcess::spawn(command, ctx.token()).map_err(|e| {
        warn!(job = ctx.name(), stage, error = %e, "Failed to launch tool");
        JobOutcome::failed(format!("{stage}: {e}"))
    })?;

    let exit = process.wait().await;
    if exit.killed || ctx.is_stopped() {
        return Err(JobOutcome::stopped());
    }
    if !exit.success() {
        warn!(job = ctx.name(), stage, code = ?exit.code, "Tool failed");
        return Err(JobOutcome::tool_failed(
            format!("{stage} failed"),
            exit.code,
        ));
    }

    ctx.update(format!("{stage}: finished"));
    Ok(exit)
}
