//! Recording entity.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::SegmentLayout;
use edl::Commercial;

/// How the recorder wrote the source media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packaging {
    /// One file at `{base}.{source_extension}`.
    #[default]
    SingleFile,
    /// Live-packaged segments plus a playlist (see [`SegmentLayout`]).
    Segmented,
}

/// Metadata the pipelines are allowed to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Media duration in seconds.
    #[serde(default)]
    pub duration_secs: f64,
    /// Extension of the derived file the catalog indexes (e.g. `mp4`).
    #[serde(default)]
    pub indexed_extension: Option<String>,
    #[serde(default)]
    pub commercials: Vec<Commercial>,
}

/// Serializable description of a recording, as supplied by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub id: String,
    /// Directory plus file stem, without extension.
    pub base_path: PathBuf,
    pub source_extension: String,
    #[serde(default)]
    pub packaging: Packaging,
    /// When the recorder actually started writing.
    pub real_start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub currently_recording: bool,
    #[serde(default)]
    pub metadata: RecordingMetadata,
}

/// A recording being post-processed.
///
/// Identity and paths are fixed. The recorder flag is owned by the catalog;
/// the metadata is written by pipelines on success only.
#[derive(Debug)]
pub struct Recording {
    id: String,
    base_path: PathBuf,
    source_extension: String,
    packaging: Packaging,
    real_start: DateTime<Utc>,
    end: DateTime<Utc>,
    currently_recording: AtomicBool,
    metadata: RwLock<RecordingMetadata>,
}

impl Recording {
    pub fn new(info: RecordingInfo) -> Self {
        Self {
            id: info.id,
            base_path: info.base_path,
            source_extension: info.source_extension,
            packaging: info.packaging,
            real_start: info.real_start,
            end: info.end,
            currently_recording: AtomicBool::new(info.currently_recording),
            metadata: RwLock::new(info.metadata),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    pub fn packaging(&self) -> Packaging {
        self.packaging
    }

    pub fn real_start(&self) -> DateTime<Utc> {
        self.real_start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_recording(&self) -> bool {
        self.currently_recording.load(Ordering::SeqCst)
    }

    pub fn set_recording(&self, recording: bool) {
        self.currently_recording.store(recording, Ordering::SeqCst);
    }

    /// Directory holding the recording's files.
    pub fn dir(&self) -> &Path {
        self.base_path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// File stem shared by the source and every derived file.
    pub fn stem(&self) -> String {
        self.base_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// `{dir}/{stem}.{extension}`.
    pub fn file_with_extension(&self, extension: &str) -> PathBuf {
        self.dir().join(format!("{}.{}", self.stem(), extension))
    }

    /// `{dir}/{prefix}{stem}.{extension}`: the in-progress name of a derived file.
    pub fn hidden_file(&self, prefix: &str, extension: &str) -> PathBuf {
        self.dir()
            .join(format!("{}{}.{}", prefix, self.stem(), extension))
    }

    pub fn source_path(&self) -> PathBuf {
        self.file_with_extension(&self.source_extension)
    }

    /// Path of the indexed derived file, if one has been produced.
    pub fn indexed_path(&self) -> Option<PathBuf> {
        self.metadata
            .read()
            .indexed_extension
            .as_deref()
            .map(|ext| self.file_with_extension(ext))
    }

    pub fn segment_path(&self, layout: &SegmentLayout, index: u64) -> PathBuf {
        self.dir().join(layout.segment_name(&self.stem(), index))
    }

    pub fn playlist_path(&self, layout: &SegmentLayout) -> PathBuf {
        self.dir().join(layout.playlist_name(&self.stem()))
    }

    pub async fn segments(&self, layout: &SegmentLayout) -> Vec<PathBuf> {
        layout.list_segments(self.dir(), &self.stem()).await
    }

    /// Copy of the current metadata.
    pub fn metadata(&self) -> RecordingMetadata {
        self.metadata.read().clone()
    }

    pub fn indexed_extension(&self) -> Option<String> {
        self.metadata.read().indexed_extension.clone()
    }

    pub fn duration_secs(&self) -> f64 {
        self.metadata.read().duration_secs
    }

    pub fn commercials(&self) -> Vec<Commercial> {
        self.metadata.read().commercials.clone()
    }

    /// Record a newly produced deliverable.
    pub fn set_indexed(&self, extension: &str, duration_secs: Option<f64>) {
        let mut metadata = self.metadata.write();
        metadata.indexed_extension = Some(extension.to_string());
        if let Some(duration) = duration_secs {
            metadata.duration_secs = duration;
        }
    }

    pub fn set_commercials(&self, commercials: Vec<Commercial>) {
        self.metadata.write().commercials = commercials;
    }

    /// Serializable snapshot including the current metadata.
    pub fn info(&self) -> RecordingInfo {
        RecordingInfo {
            id: self.id.clone(),
            base_path: self.base_path.clone(),
            source_extension: self.source_extension.clone(),
            packaging: self.packaging,
            real_start: self.real_start,
            end: self.end,
            currently_recording: self.is_recording(),
            metadata: self.metadata(),
        }
    }
}

impl From<RecordingInfo> for Recording {
    fn from(info: RecordingInfo) -> Self {
        Self::new(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Recording {
        let now = Utc::now();
        Recording::new(RecordingInfo {
            id: "rec-1".to_string(),
            base_path: PathBuf::from("/media/tv/Evening News"),
            source_extension: "ts".to_string(),
            packaging: Packaging::SingleFile,
            real_start: now,
            end: now,
            currently_recording: false,
            metadata: RecordingMetadata::default(),
        })
    }

    #[test]
    fn test_paths() {
        let rec = sample();
        assert_eq!(rec.stem(), "Evening News");
        assert_eq!(rec.dir(), Path::new("/media/tv"));
        assert_eq!(rec.source_path(), PathBuf::from("/media/tv/Evening News.ts"));
        assert_eq!(
            rec.hidden_file(".", "mp4"),
            PathBuf::from("/media/tv/.Evening News.mp4")
        );
        assert_eq!(
            rec.segment_path(&SegmentLayout::default(), 3),
            PathBuf::from("/media/tv/Evening News-00003.ts")
        );
        assert_eq!(
            rec.playlist_path(&SegmentLayout::default()),
            PathBuf::from("/media/tv/Evening News.m3u8")
        );
    }

    #[test]
    fn test_indexed_path_follows_metadata() {
        let rec = sample();
        assert!(rec.indexed_path().is_none());

        rec.set_indexed("mp4", Some(1800.0));
        assert_eq!(
            rec.indexed_path(),
            Some(PathBuf::from("/media/tv/Evening News.mp4"))
        );
        assert_eq!(rec.duration_secs(), 1800.0);

        // A missing duration leaves the previous one in place.
        rec.set_indexed("m4v", None);
        assert_eq!(rec.indexed_extension().as_deref(), Some("m4v"));
        assert_eq!(rec.duration_secs(), 1800.0);
    }

    #[test]
    fn test_info_round_trip_through_json() {
        let rec = sample();
        rec.set_commercials(vec![Commercial::new(1.0, 2.0)]);
        let json = serde_json::to_string(&rec.info()).unwrap();
        let restored = Recording::from(serde_json::from_str::<RecordingInfo>(&json).unwrap());
        assert_eq!(restored.commercials(), vec![Commercial::new(1.0, 2.0)]);
        assert_eq!(restored.packaging(), Packaging::SingleFile);
    }
}
