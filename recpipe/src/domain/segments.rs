//! Naming of segmented (live-packaged) recordings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_segment_extension() -> String {
    "ts".to_string()
}

fn default_playlist_extension() -> String {
    "m3u8".to_string()
}

fn default_index_digits() -> usize {
    5
}

/// How a segmented recording lays out its files next to the base path.
///
/// Segments are `{stem}-{index}.{segment_extension}` with a zero-padded,
/// zero-based index. The playlist is `{stem}.{playlist_extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLayout {
    #[serde(default = "default_segment_extension")]
    pub segment_extension: String,
    #[serde(default = "default_playlist_extension")]
    pub playlist_extension: String,
    #[serde(default = "default_index_digits")]
    pub index_digits: usize,
}

impl Default for SegmentLayout {
    fn default() -> Self {
        Self {
            segment_extension: default_segment_extension(),
            playlist_extension: default_playlist_extension(),
            index_digits: default_index_digits(),
        }
    }
}

impl SegmentLayout {
    pub fn segment_name(&self, stem: &str, index: u64) -> String {
        format!(
            "{stem}-{index:0width$}.{ext}",
            width = self.index_digits,
            ext = self.segment_extension
        )
    }

    pub fn playlist_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.playlist_extension)
    }

    /// Whether `file_name` is a segment of the recording named `stem`.
    ///
    /// The part between `{stem}-` and `.{segment_extension}` must be a
    /// decimal index at least `index_digits` wide, so `show-late-00000.ts`
    /// belongs to `show-late` and not to `show`.
    pub fn is_segment_of(&self, stem: &str, file_name: &str) -> bool {
        let suffix = format!(".{}", self.segment_extension);
        file_name
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(suffix.as_str()))
            .is_some_and(|index| {
                index.len() >= self.index_digits.max(1)
                    && index.bytes().all(|b| b.is_ascii_digit())
            })
    }

    /// List the segments of `stem` inside `dir`, sorted by name.
    ///
    /// Unreadable directories yield an empty list.
    pub async fn list_segments(&self, dir: &Path, stem: &str) -> Vec<PathBuf> {
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return Vec::new();
        };

        let mut segments = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.is_segment_of(stem, name));
            if is_file && matches {
                segments.push(entry.path());
            }
        }
        segments.sort();
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_names() {
        let layout = SegmentLayout::default();
        assert_eq!(layout.segment_name("show", 7), "show-00007.ts");
        assert_eq!(layout.playlist_name("show"), "show.m3u8");
    }

    #[test]
    fn test_is_segment_of() {
        let layout = SegmentLayout::default();
        assert!(layout.is_segment_of("show", "show-00001.ts"));
        assert!(!layout.is_segment_of("show", "show.ts"));
        assert!(!layout.is_segment_of("show", "show-.ts"));
        assert!(!layout.is_segment_of("show", "show.m3u8"));
        assert!(!layout.is_segment_of("show", "other-00001.ts"));
        assert!(!layout.is_segment_of("show", "show-00001.mp4"));
        assert!(layout.is_segment_of("show", "show-123456.ts"));
        assert!(!layout.is_segment_of("show", "show-late-00000.ts"));
        assert!(!layout.is_segment_of("show", "show-12.ts"));
        assert!(layout.is_segment_of("show-late", "show-late-00000.ts"));
    }

    #[tokio::test]
    async fn test_list_segments_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        let layout = SegmentLayout::default();
        for i in [2, 0, 1] {
            std::fs::write(dir.path().join(layout.segment_name("show", i)), b"x").unwrap();
        }
        std::fs::write(dir.path().join("show.m3u8"), b"x").unwrap();
        std::fs::write(dir.path().join("show.ts"), b"x").unwrap();

        std::fs::write(dir.path().join("show-late-00000.ts"), b"x").unwrap();

        let segments = layout.list_segments(dir.path(), "show").await;
        let names: Vec<_> = segments
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["show-00000.ts", "show-00001.ts", "show-00002.ts"]);
    }
}
