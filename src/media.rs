use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::geometry::AnnotationGeometry;

// ── MediaKind ────────────────────────────────────────────────────────────────

/// The kind of a classified asset. An asset always has exactly one kind;
/// unclassifiable content is represented by `None` at the classifier level
/// and never becomes a [`MediaAsset`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    /// File extension used when materializing an asset of this kind.
    ///
    /// ```
    /// # use pdfmediaextract::MediaKind;
    /// assert_eq!(MediaKind::Audio.extension(), "mp3");
    /// assert_eq!(MediaKind::Image.extension(), "png");
    /// ```
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
            MediaKind::Image => "png",
        }
    }

    /// Lowercase label used as the leading component of cache file names.
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }

    /// `true` for the time-based kinds.
    pub fn is_playable(self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Video)
    }
}

// ── TimeWindow ───────────────────────────────────────────────────────────────

/// A playback sub-range of a media file, in milliseconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Length of the window; zero when the end precedes the start.
    pub fn duration_ms(&self) -> i64 {
        (self.end_ms - self.start_ms).max(0)
    }
}

// ── MediaAsset ───────────────────────────────────────────────────────────────

/// One media item discovered on a page and materialized in the cache
/// directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaAsset {
    /// Label derived from the extraction path. Not guaranteed unique.
    pub name: String,

    /// Location of the extracted bytes.
    pub path: PathBuf,

    pub kind: MediaKind,

    /// 0-indexed page the asset was found on.
    pub page_index: Option<usize>,

    /// Tap target in PDF page space. Present only for assets discovered
    /// through an annotation.
    pub hit_region: Option<AnnotationGeometry>,

    /// Playback restriction, from a MediaClip or the sidecar mapping.
    pub time_window: Option<TimeWindow>,
}

impl MediaAsset {
    /// Returns the file name component of [`MediaAsset::path`].
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Size of the materialized file, or `None` when it no longer exists.
    pub fn file_len(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    /// `true` when the asset can be targeted by a tap.
    pub fn is_tappable(&self) -> bool {
        self.hit_region.is_some()
    }

    pub(crate) fn lives_at(&self, path: &Path) -> bool {
        self.path == path
    }
}
