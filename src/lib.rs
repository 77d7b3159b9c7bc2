//! # pdfmediaextract
//!
//! Find the audio, video and image assets embedded in a PDF page, and work out
//! where on the page a reader has to tap to play each one.
//!
//! ## What this crate does
//!
//! 1. **Walk the object graph** of a page (resources, content streams,
//!    annotations) with a depth bound and a visited set, so cyclic or
//!    pathologically nested documents still terminate.
//! 2. **Classify streams** by sniffing container signatures (MP3, MP4/MOV,
//!    AVI, WAV, OGG, FLAC, WebM) before trusting any declared metadata.
//! 3. **Follow RichMedia annotations** through
//!    `RichMediaContent → Assets → FileSpec → EF → F` to the embedded file, and
//!    through `Instances → Params → MediaClip` to a playback window.
//! 4. **Materialize** each distinct asset into a cache directory, merging
//!    duplicates found by different paths and keeping the richest metadata.
//! 5. **Hit-test** taps on a rendered page against annotation rectangles,
//!    converting between PDF (bottom-left) and display (top-left) space.
//!
//! ## Quick example
//!
//! ```no_run
//! use pdfmediaextract::{ExtractorConfig, MediaExtractor};
//!
//! let extractor = MediaExtractor::new(ExtractorConfig::default());
//!
//! // Pages are 0-indexed.
//! for asset in extractor.extract_page_media("lesson.pdf", 1) {
//!     println!("{:?} {} {:?}", asset.kind, asset.path.display(), asset.time_window);
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

mod annotations;
mod classifier;
mod extraction_engine;
mod extractor;
mod extractor_validation;
mod file_discovery;
mod file_parsing;
mod geometry;
mod media;
mod media_clip;
mod pdf_utils;
mod registry;
mod session;
mod sidecar;
mod validator;
mod walker;

pub use classifier::{classify, classify_by_content_type, classify_by_metadata, sniff_signature, Signature};
pub use extractor::MediaExtractor;
pub use geometry::{find_hit, AnnotationGeometry, DisplayRect, DisplayTransform};
pub use media::{MediaAsset, MediaKind, TimeWindow};
pub use media_clip::time_window_from_media_clip;
pub use registry::{AddOutcome, MediaRegistry};
pub use session::{PageRequestTracker, PageTicket};
pub use sidecar::{PageSegments, Segment, SegmentMapping};
pub use walker::{resolve, ObjectWalker, StreamSite};

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for [`MediaExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Directory extracted asset files are written to. Created on demand.
    pub cache_directory: PathBuf,

    /// Recursion bound for the object-graph walker. Traversal stops silently
    /// once the depth exceeds this value.
    pub max_depth: usize,

    /// Streams must be strictly longer than this many bytes to be extracted
    /// as audio or video.
    pub min_stream_len: usize,

    /// XObjects declared `/Image` are only sniffed for audio/video content
    /// when they are longer than this.
    pub large_stream_len: usize,

    /// Number of leading bytes compared when two same-sized files of the same
    /// kind are checked for identical content.
    pub sample_len: usize,

    /// Directories searched for a `<pdf file name>.json` time-range sidecar.
    pub sidecar_directories: Vec<PathBuf>,

    /// Per-edge tolerance, in PDF units, when matching sidecar segments to
    /// annotation rectangles.
    pub sidecar_tolerance: f32,

    /// Per-edge tolerance, in PDF units, applied when hit-testing taps.
    pub tap_tolerance: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            cache_directory: std::env::temp_dir().join("pdf_media"),
            max_depth: 5,
            min_stream_len: 100,
            large_stream_len: 5000,
            sample_len: 1024,
            sidecar_directories: Vec::new(),
            sidecar_tolerance: 5.0,
            tap_tolerance: 20.0,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
///
/// Only the document-level `try_*` entry points return these. Failures inside
/// a single annotation, asset or stream are logged and skipped.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A filesystem I/O error occurred (loading the PDF, writing the cache).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input is missing, empty, or not a usable PDF document.
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    ParseError(#[from] lopdf::Error),

    /// The requested page does not exist.
    #[error("Page index {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    /// An image XObject could not be decoded or re-encoded.
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    /// The time-range sidecar could not be parsed.
    #[error("Sidecar mapping error: {0}")]
    Sidecar(#[from] serde_json::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ExtractError>;
