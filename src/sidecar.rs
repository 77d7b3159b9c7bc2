//! Optional JSON sidecar supplying time windows for annotation rectangles
//! when the PDF carries no MediaClip.
//!
//! A sidecar for `lesson.pdf` is named `lesson.pdf.json` and looks like:
//!
//! ```json
//! {
//!   "lesson.pdf": {
//!     "pages": [
//!       {
//!         "pageNumber": 2,
//!         "segments": [
//!           { "rect": [15.99, 594.98, 52.50, 566.25], "startTime": 0, "endTime": 10000 }
//!         ]
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! The top-level key may also be the file stem (`lesson`). `pageNumber` is
//! 1-based; everything else in the crate uses 0-based page indices.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::geometry::AnnotationGeometry;
use crate::media::TimeWindow;
use crate::Result;

/// One rectangle-to-time-range entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// `[left, top, right, bottom]` in PDF units.
    pub rect: [f32; 4],
    pub start_time: i64,
    pub end_time: i64,
}

impl Segment {
    pub fn geometry(&self) -> AnnotationGeometry {
        let [left, top, right, bottom] = self.rect;
        AnnotationGeometry::new(left, top, right, bottom)
    }

    /// Per-edge match against an annotation rectangle.
    pub fn matches(&self, rect: &AnnotationGeometry, tolerance: f32) -> bool {
        self.geometry().matches_within(rect, tolerance)
    }

    pub fn time_window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSegments {
    /// 1-based.
    pub page_number: usize,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    pages: Vec<PageSegments>,
}

/// Segments for one PDF file.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMapping {
    pub pdf_file_name: String,
    pub pages: Vec<PageSegments>,
}

impl SegmentMapping {
    /// Parse a sidecar document and pick the entry for `pdf_file_name`,
    /// falling back to its stem.
    ///
    /// Returns `Ok(None)` when the document has no entry for the file.
    pub fn from_json_str(json: &str, pdf_file_name: &str) -> Result<Option<Self>> {
        let root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let stem = Path::new(pdf_file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(pdf_file_name);
        let Some(value) = root.get(pdf_file_name).or_else(|| root.get(stem)) else {
            debug!(pdf = pdf_file_name, "sidecar has no entry for this file");
            return Ok(None);
        };

        let entry: MappingEntry = serde_json::from_value(value.clone())?;
        debug!(
            pdf = pdf_file_name,
            pages = entry.pages.len(),
            segments = entry.pages.iter().map(|p| p.segments.len()).sum::<usize>(),
            "sidecar mapping parsed"
        );
        Ok(Some(Self {
            pdf_file_name: pdf_file_name.to_string(),
            pages: entry.pages,
        }))
    }

    /// Read and parse one sidecar file.
    pub fn from_file(path: &Path, pdf_file_name: &str) -> Result<Option<Self>> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json, pdf_file_name)
    }

    /// Look for `<pdf file name>.json` in each directory in order and return
    /// the first usable mapping. Unreadable or malformed sidecars are logged
    /// and skipped.
    pub fn load(pdf_path: &Path, directories: &[PathBuf]) -> Option<Self> {
        let pdf_file_name = pdf_path.file_name()?.to_str()?;
        let sidecar_name = format!("{pdf_file_name}.json");

        for dir in directories {
            let candidate = dir.join(&sidecar_name);
            if !candidate.is_file() {
                continue;
            }
            match Self::from_file(&candidate, pdf_file_name) {
                Ok(Some(mapping)) => {
                    debug!(path = %candidate.display(), "sidecar mapping loaded");
                    return Some(mapping);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %candidate.display(), error = %e, "ignoring unreadable sidecar"),
            }
        }
        None
    }

    /// Time window of the first segment on `page_index` (0-based) whose
    /// rectangle matches `rect` within `tolerance` on every edge.
    pub fn time_window_for(
        &self,
        page_index: usize,
        rect: &AnnotationGeometry,
        tolerance: f32,
    ) -> Option<TimeWindow> {
        self.pages
            .iter()
            .filter(|p| p.page_number == page_index + 1)
            .flat_map(|p| p.segments.iter())
            .find(|s| s.matches(rect, tolerance))
            .map(Segment::time_window)
    }
}
