//! Post-processing configuration.
//!
//! The configuration is a serde tree where every field has a default, so a
//! config file only needs to mention what it changes. Loading order is:
//! defaults, then the JSON file (if any), then environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::SegmentLayout;
use crate::{Error, Result};

fn default_hidden_prefix() -> String {
    ".".to_string()
}

/// Top-level configuration for workers and the maintenance job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Prefix marking in-progress outputs (e.g. `.show.mp4`).
    #[serde(default = "default_hidden_prefix")]
    pub hidden_prefix: String,

    /// Scheduling-priority wrapper prepended to every tool (e.g. `nice -n 10`).
    /// Only honoured on Unix.
    #[serde(default)]
    pub priority_prefix: Option<String>,

    #[serde(default)]
    pub job: JobConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub screenshot: ScreenshotConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub segments: SegmentLayout,

    #[serde(default)]
    pub edl: EdlConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            hidden_prefix: default_hidden_prefix(),
            priority_prefix: None,
            job: JobConfig::default(),
            tools: ToolsConfig::default(),
            screenshot: ScreenshotConfig::default(),
            transcode: TranscodeConfig::default(),
            segments: SegmentLayout::default(),
            edl: EdlConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl PostProcessConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file (JSON). Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io_path("reading config", path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "Loaded post-processing config");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(prefix) = lookup("RECPIPE_PRIORITY_PREFIX") {
            self.priority_prefix = Some(prefix).filter(|p| !p.trim().is_empty());
        }
        if let Some(prefix) = lookup("RECPIPE_HIDDEN_PREFIX") {
            self.hidden_prefix = prefix;
        }
        if let Some(path) = lookup("FFMPEG_PATH") {
            self.tools.ffmpeg_path = path;
        }
        if let Some(path) = lookup("COMSKIP_PATH") {
            self.tools.comskip_path = path;
        }
        if let Some(path) = lookup("MKVPROPEDIT_PATH") {
            self.tools.mkvpropedit_path = path;
        }
    }

    /// Reject values the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_prefix.is_empty() {
            return Err(Error::config("hidden_prefix must not be empty"));
        }
        if self.job.readiness_polls == 0 {
            return Err(Error::config("job.readiness_polls must be at least 1"));
        }
        for (name, template) in self.tools.templates() {
            if template.trim().is_empty() {
                return Err(Error::config(format!("tools.{name} must not be empty")));
            }
        }
        let screenshot = &self.screenshot;
        let duration = screenshot.segment_duration_secs;
        if !(duration > 0.0 && duration.is_finite()) {
            return Err(Error::config(
                "screenshot.segment_duration_secs must be a positive number",
            ));
        }
        for (name, value) in [
            ("offset_secs", screenshot.offset_secs),
            ("margin_secs", screenshot.margin_secs),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(Error::config(format!(
                    "screenshot.{name} must be a non-negative number"
                )));
            }
        }
        if self.transcode.extension.is_empty() {
            return Err(Error::config("transcode.extension must not be empty"));
        }
        Ok(())
    }

    pub fn with_hidden_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hidden_prefix = prefix.into();
        self
    }

    pub fn with_priority_prefix(mut self, prefix: Option<String>) -> Self {
        self.priority_prefix = prefix;
        self
    }

    pub fn with_job(mut self, job: JobConfig) -> Self {
        self.job = job;
        self
    }

    pub fn with_tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = cleanup;
        self
    }
}

fn default_sleep_time_ms() -> u64 {
    1000
}

fn default_readiness_polls() -> u32 {
    180
}

/// Polling behaviour shared by all pipeline jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Interval between run-loop iterations.
    #[serde(default = "default_sleep_time_ms")]
    pub sleep_time_ms: u64,

    /// How many polls a readiness gate gets before the job gives up.
    #[serde(default = "default_readiness_polls")]
    pub readiness_polls: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            sleep_time_ms: default_sleep_time_ms(),
            readiness_polls: default_readiness_polls(),
        }
    }
}

impl JobConfig {
    pub fn sleep_time(&self) -> Duration {
        Duration::from_millis(self.sleep_time_ms)
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_comskip_path() -> String {
    "comskip".to_string()
}

fn default_mkvpropedit_path() -> String {
    "mkvpropedit".to_string()
}

fn default_commercial_detect() -> String {
    r#"{comskip} --quiet --output "{dir}" "{input}""#.to_string()
}

fn default_screenshot() -> String {
    r#"{ffmpeg} -y -hide_banner -nostats -ss {offset} -i "{input}" -frames:v 1 -f image2 "{output}""#
        .to_string()
}

fn default_screenshot_variant() -> String {
    r#"{ffmpeg} -y -hide_banner -nostats -i "{input}" -vf "{filter}" -frames:v 1 -f image2 "{output}""#
        .to_string()
}

fn default_concat() -> String {
    r#"{ffmpeg} -y -hide_banner -nostats -f concat -safe 0 -i "{list}" -map 0 -c copy -f mpegts "{output}""#
        .to_string()
}

fn default_remux_intermediate() -> String {
    r#"{ffmpeg} -y -hide_banner -nostats -i "{input}" -map 0:v:0 -map 0:a -c copy -f matroska "{output}""#
        .to_string()
}

fn default_remux_edit_flags() -> String {
    r#"{mkvpropedit} "{input}" --edit track:a1 --set flag-default=1 --edit track:v1 --set flag-default=1"#
        .to_string()
}

fn default_remux_package() -> String {
    r#"{ffmpeg} -y -hide_banner -nostats -i "{input}" -map 0 -c copy -movflags +faststart -f mp4 "{output}""#
        .to_string()
}

fn default_transcode() -> String {
    r#"{ffmpeg} -y -hide_banner -nostats -i "{input}" -map 0:v:0 -map 0:a:0 -c:v libx264 -preset veryfast -crf 23 -vf "scale=-2:720" -c:a aac -b:a 160k -movflags +faststart -f mp4 "{output}""#
        .to_string()
}

/// Tool locations and command templates.
///
/// Templates are split into arguments before placeholders are substituted, so
/// a substituted path containing spaces stays one argument. Quote a
/// placeholder only when it sits inside a larger argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_comskip_path")]
    pub comskip_path: String,
    #[serde(default = "default_mkvpropedit_path")]
    pub mkvpropedit_path: String,

    #[serde(default = "default_commercial_detect")]
    pub commercial_detect: String,
    #[serde(default = "default_screenshot")]
    pub screenshot: String,
    #[serde(default = "default_screenshot_variant")]
    pub screenshot_variant: String,
    #[serde(default = "default_concat")]
    pub concat: String,
    /// Stage 1: source to intermediate container with selected tracks.
    #[serde(default = "default_remux_intermediate")]
    pub remux_intermediate: String,
    /// Stage 2: edit track flags on the intermediate in place.
    #[serde(default = "default_remux_edit_flags")]
    pub remux_edit_flags: String,
    /// Stage 3: intermediate to deliverable container.
    #[serde(default = "default_remux_package")]
    pub remux_package: String,
    #[serde(default = "default_transcode")]
    pub transcode: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            comskip_path: default_comskip_path(),
            mkvpropedit_path: default_mkvpropedit_path(),
            commercial_detect: default_commercial_detect(),
            screenshot: default_screenshot(),
            screenshot_variant: default_screenshot_variant(),
            concat: default_concat(),
            remux_intermediate: default_remux_intermediate(),
            remux_edit_flags: default_remux_edit_flags(),
            remux_package: default_remux_package(),
            transcode: default_transcode(),
        }
    }
}

impl ToolsConfig {
    /// All templates with their config names.
    pub fn templates(&self) -> [(&'static str, &str); 8] {
        [
            ("commercial_detect", &self.commercial_detect),
            ("screenshot", &self.screenshot),
            ("screenshot_variant", &self.screenshot_variant),
            ("concat", &self.concat),
            ("remux_intermediate", &self.remux_intermediate),
            ("remux_edit_flags", &self.remux_edit_flags),
            ("remux_package", &self.remux_package),
            ("transcode", &self.transcode),
        ]
    }
}

/// A resized/cropped still derived from the primary screenshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenshotVariant {
    /// Inserted between the stem and the extension: `{stem}.{suffix}.png`.
    pub suffix: String,
    /// Video filter passed as `{filter}`.
    pub filter: String,
}

fn default_screenshot_offset() -> f64 {
    60.0
}

fn default_screenshot_margin() -> f64 {
    10.0
}

fn default_segment_duration() -> f64 {
    10.0
}

fn default_screenshot_extension() -> String {
    "png".to_string()
}

fn default_variants() -> Vec<ScreenshotVariant> {
    vec![
        ScreenshotVariant {
            suffix: "small".to_string(),
            filter: "scale=320:-2".to_string(),
        },
        ScreenshotVariant {
            suffix: "wide".to_string(),
            filter: "crop=iw:iw*9/16,scale=1280:720".to_string(),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Position of the still, in seconds from the start of the recording.
    #[serde(default = "default_screenshot_offset")]
    pub offset_secs: f64,
    /// Extra wall-clock wait past the offset for single-file recordings.
    #[serde(default = "default_screenshot_margin")]
    pub margin_secs: f64,
    /// Nominal length of one segment of a segmented recording.
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: f64,
    #[serde(default = "default_screenshot_extension")]
    pub extension: String,
    #[serde(default = "default_variants")]
    pub variants: Vec<ScreenshotVariant>,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            offset_secs: default_screenshot_offset(),
            margin_secs: default_screenshot_margin(),
            segment_duration_secs: default_segment_duration(),
            extension: default_screenshot_extension(),
            variants: default_variants(),
        }
    }
}

fn default_transcode_extension() -> String {
    "m4v".to_string()
}

fn default_remux_extension() -> String {
    "mp4".to_string()
}

fn default_intermediate_extension() -> String {
    "mkv".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Deliverable extension of the remux chain.
    #[serde(default = "default_remux_extension")]
    pub remux_extension: String,
    /// Extension of the remux chain's intermediate container.
    #[serde(default = "default_intermediate_extension")]
    pub intermediate_extension: String,
    /// Deliverable extension of the constrained-profile transcode.
    #[serde(default = "default_transcode_extension")]
    pub extension: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            remux_extension: default_remux_extension(),
            intermediate_extension: default_intermediate_extension(),
            extension: default_transcode_extension(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdlConfig {
    /// Frame rate for detectors that write frame numbers instead of seconds.
    #[serde(default)]
    pub frame_rate: Option<f64>,
}

impl EdlConfig {
    pub fn units(&self) -> edl::EdlUnits {
        match self.frame_rate {
            Some(fps) if fps > 0.0 => edl::EdlUnits::Frames { fps },
            _ => edl::EdlUnits::Seconds,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_initial_delay_secs() -> u64 {
    120
}

fn default_time_between_cleanings_secs() -> u64 {
    3600
}

fn default_minimum_age_secs() -> u64 {
    24 * 3600
}

/// Configuration for the maintenance (segment cleanup) job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Delay before the first sweep after startup.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// Interval between sweeps.
    #[serde(default = "default_time_between_cleanings_secs")]
    pub time_between_cleanings_secs: u64,
    /// How long after `end + duration` the segments are kept.
    #[serde(default = "default_minimum_age_secs")]
    pub minimum_age_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            initial_delay_secs: default_initial_delay_secs(),
            time_between_cleanings_secs: default_time_between_cleanings_secs(),
            minimum_age_secs: default_minimum_age_secs(),
        }
    }
}

impl CleanupConfig {
    pub fn with_initial_delay_secs(mut self, secs: u64) -> Self {
        self.initial_delay_secs = secs;
        self
    }

    pub fn with_time_between_cleanings_secs(mut self, secs: u64) -> Self {
        self.time_between_cleanings_secs = secs;
        self
    }

    pub fn with_minimum_age_secs(mut self, secs: u64) -> Self {
        self.minimum_age_secs = secs;
        self
    }

    pub fn time_between_cleanings(&self) -> Duration {
        Duration::from_secs(self.time_between_cleanings_secs)
    }

    pub fn minimum_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.minimum_age_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = PostProcessConfig::default();
        assert_eq!(config.hidden_prefix, ".");
        assert_eq!(config.job.sleep_time_ms, 1000);
        assert_eq!(config.job.readiness_polls, 180);
        assert_eq!(config.cleanup.initial_delay_secs, 120);
        assert_eq!(config.screenshot.variants.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_partial() {
        let json = r#"{
            "priority_prefix": "nice -n 15",
            "job": { "readiness_polls": 30 },
            "cleanup": { "minimum_age_secs": 60 }
        }"#;

        let config: PostProcessConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.priority_prefix.as_deref(), Some("nice -n 15"));
        assert_eq!(config.job.readiness_polls, 30);
        assert_eq!(config.job.sleep_time_ms, 1000); // default
        assert_eq!(config.cleanup.minimum_age_secs, 60);
        assert_eq!(config.cleanup.time_between_cleanings_secs, 3600); // default
        assert_eq!(config.tools.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
            ("RECPIPE_PRIORITY_PREFIX", "nice -n 5"),
            ("RECPIPE_HIDDEN_PREFIX", "~"),
        ]
        .into_iter()
        .collect();

        let mut config = PostProcessConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.tools.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.priority_prefix.as_deref(), Some("nice -n 5"));
        assert_eq!(config.hidden_prefix, "~");
        assert_eq!(config.tools.comskip_path, "comskip");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PostProcessConfig::default().with_hidden_prefix("");
        assert!(config.validate().is_err());

        let config = PostProcessConfig::default().with_job(JobConfig {
            sleep_time_ms: 10,
            readiness_polls: 0,
        });
        assert!(config.validate().is_err());

        let mut config = PostProcessConfig::default();
        config.tools.transcode = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_screenshot_timing() {
        for duration in [0.0, -4.0, f64::NAN, f64::INFINITY] {
            let mut config = PostProcessConfig::default();
            config.screenshot.segment_duration_secs = duration;
            assert!(config.validate().is_err(), "segment duration {duration}");
        }

        for value in [-1.0, f64::NAN, f64::INFINITY] {
            let mut config = PostProcessConfig::default();
            config.screenshot.offset_secs = value;
            assert!(config.validate().is_err(), "offset {value}");

            let mut config = PostProcessConfig::default();
            config.screenshot.margin_secs = value;
            assert!(config.validate().is_err(), "margin {value}");
        }

        let mut config = PostProcessConfig::default();
        config.screenshot.offset_secs = 0.0;
        config.screenshot.margin_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("recpipe.json");
        std::fs::write(&path, r#"{ "hidden_prefix": "_" }"#).unwrap();

        let config = PostProcessConfig::from_file(&path).unwrap();
        assert_eq!(config.hidden_prefix, "_");

        let missing = PostProcessConfig::from_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::IoPath { .. })));
    }

    #[test]
    fn test_edl_units() {
        assert_eq!(EdlConfig::default().units(), edl::EdlUnits::Seconds);
        let config = EdlConfig {
            frame_rate: Some(29.97),
        };
        assert_eq!(config.units(), edl::EdlUnits::Frames { fps: 29.97 });
    }
}
