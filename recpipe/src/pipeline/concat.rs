//! Joining a segmented recording into one source file.
//!
//! Used ahead of remux/transcode when the single source file is missing but
//! segments exist. The joined file is written to the hidden source name and
//! renamed to the source name on success. The concat list is always removed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};

use super::{PipelineContext, files, run_tool};
use crate::job::{Job, JobContext, JobOutcome};
use crate::{Error, Result};

/// Extension of the hidden concat list.
const LIST_EXTENSION: &str = "ffconcat";

pub struct ConcatJob {
    pipeline: PipelineContext,
}

impl ConcatJob {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self { pipeline }
    }

    /// Whether `recording` has to be joined before it can be processed.
    pub async fn is_needed(pipeline: &PipelineContext) -> bool {
        let recording = &pipeline.recording;
        !fs::try_exists(recording.source_path()).await.unwrap_or(false)
            && !recording.segments(&pipeline.config.segments).await.is_empty()
    }

    async fn segments(&self) -> Vec<PathBuf> {
        self.pipeline
            .recording
            .segments(&self.pipeline.config.segments)
            .await
    }

    async fn join(&self, ctx: &JobContext, list: &Path) -> JobOutcome {
        let recording = &self.pipeline.recording;
        let segments = self.segments().await;
        if segments.is_empty() {
            return JobOutcome::failed("no segments to join");
        }

        if let Err(e) = write_list(list, &segments).await {
            warn!(error = %e, "Failed to write concat list");
            return JobOutcome::failed(e.to_string());
        }
        ctx.update(format!("joining {} segment(s)", segments.len()));

        let hidden = self.pipeline.hidden(recording.source_extension());
        let vars = self
            .pipeline
            .base_vars()
            .path("list", list)
            .path("output", &hidden);
        let template = &self.pipeline.config.tools.concat;
        let command = match self.pipeline.command("concat", template, &vars) {
            Ok(command) => command,
            Err(outcome) => return outcome,
        };

        if let Err(outcome) = run_tool(ctx, "concat", &command).await {
            files::discard(&hidden).await;
            return outcome;
        }

        match files::finalize(&hidden, &recording.source_path()).await {
            Ok(_) => {
                info!(recording = recording.id(), "Segments joined");
                JobOutcome::Succeeded
            }
            Err(e) => {
                warn!(error = %e, "Failed to publish joined source");
                files::discard(&hidden).await;
                JobOutcome::failed(e.to_string())
            }
        }
    }
}

/// Write an ffconcat list naming every segment.
async fn write_list(path: &Path, segments: &[PathBuf]) -> Result<()> {
    let mut text = String::from("ffconcat version 1.0\n");
    for segment in segments {
        let escaped = segment.to_string_lossy().replace('\'', r"'\''");
        text.push_str(&format!("file '{escaped}'\n"));
    }
    fs::write(path, text)
        .await
        .map_err(|e| Error::io_path("writing concat list", path, e))
}

#[async_trait]
impl Job for ConcatJob {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn sleep_time(&self) -> Duration {
        self.pipeline.config.job.sleep_time()
    }

    async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
        let list = self.pipeline.hidden(LIST_EXTENSION);
        let outcome = self.join(ctx, &list).await;
        files::remove_quietly(&list).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_list_escapes_quotes() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join(".show.ffconcat");
        write_list(
            &list,
            &[
                PathBuf::from("/rec/show-00000.ts"),
                PathBuf::from("/rec/it's-00001.ts"),
            ],
        )
        .await
        .unwrap();

        let text = std::fs::read_to_string(&list).unwrap();
        assert_eq!(
            text,
            "ffconcat version 1.0\nfile '/rec/show-00000.ts'\nfile '/rec/it'\\''s-00001.ts'\n"
        );
    }
}
