#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recpipe::{
    JobManager, Packaging, PipelineKind, PostProcessConfig, Recording, RecordingInfo,
    RecordingMetadata, Worker,
};
use tempfile::TempDir;

/// Scratch area: `tools/` holds stand-in scripts, `media/` the recordings.
pub struct Sandbox {
    pub root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("tools")).unwrap();
        std::fs::create_dir(root.path().join("media")).unwrap();
        Self { root }
    }

    pub fn media(&self) -> PathBuf {
        self.root.path().join("media")
    }

    /// File appended to by tools to record the order they ran in.
    pub fn run_log(&self) -> PathBuf {
        self.root.path().join("runs.log")
    }

    pub fn runs(&self) -> Vec<String> {
        std::fs::read_to_string(self.run_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Write a shell script and return a template invoking it with `args`.
    pub fn tool(&self, name: &str, body: &str, args: &str) -> String {
        let path = self.root.path().join("tools").join(format!("{name}.sh"));
        let script = format!(
            "RUN_LOG='{}'\necho {name} >> \"$RUN_LOG\"\n{body}\n",
            self.run_log().display()
        );
        std::fs::write(&path, script).unwrap();
        format!("sh {} {args}", path.display())
    }

    pub fn recording(&self, stem: &str, packaging: Packaging) -> Arc<Recording> {
        let now = Utc::now();
        self.recording_at(stem, packaging, now - chrono::Duration::hours(2), now)
    }

    pub fn recording_at(
        &self,
        stem: &str,
        packaging: Packaging,
        real_start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Arc<Recording> {
        Arc::new(Recording::new(RecordingInfo {
            id: stem.to_string(),
            base_path: self.media().join(stem),
            source_extension: "ts".to_string(),
            packaging,
            real_start,
            end,
            currently_recording: false,
            metadata: RecordingMetadata::default(),
        }))
    }
}

/// Defaults with a fast poll so gates resolve quickly in real time.
pub fn fast_config() -> PostProcessConfig {
    let mut config = PostProcessConfig::default();
    config.job.sleep_time_ms = 10;
    config
}

pub fn worker(kind: PipelineKind, config: PostProcessConfig) -> Worker {
    Worker::new(kind.as_str(), kind, Arc::new(config), JobManager::new())
}

pub fn touch(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
}
