//! Annotation rectangles and the conversion between PDF page space
//! (bottom-left origin, y up) and display space (top-left origin, y down).

use lopdf::{Dictionary, Document};
use serde::Serialize;

use crate::media::MediaAsset;
use crate::pdf_utils::object_number;
use crate::walker::{inherited_attribute, resolve, resolve_array};

// ── AnnotationGeometry ───────────────────────────────────────────────────────

/// An annotation rectangle in PDF page space.
///
/// `top` and `bottom` keep PDF semantics: for a well-formed `/Rect`,
/// `top >= bottom`. Values are stored exactly as read and never flipped.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct AnnotationGeometry {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl AnnotationGeometry {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Read an annotation's `/Rect`, stored by PDF as `[left bottom right top]`.
    ///
    /// Returns `None` when the entry is missing, shorter than four elements, or
    /// holds non-numeric values.
    pub fn from_annotation(document: &Document, annotation: &Dictionary) -> Option<Self> {
        let rect = annotation.get(b"Rect").ok()?;
        let values = resolve_array(document, rect)?;
        if values.len() < 4 {
            return None;
        }

        let mut n = [0f32; 4];
        for (slot, value) in n.iter_mut().zip(values.iter()) {
            *slot = object_number(resolve(document, value)?)?;
        }
        let [left, bottom, right, top] = n;

        Some(Self { left, top, right, bottom })
    }

    pub fn min_x(&self) -> f32 {
        self.left.min(self.right)
    }

    pub fn max_x(&self) -> f32 {
        self.left.max(self.right)
    }

    pub fn min_y(&self) -> f32 {
        self.top.min(self.bottom)
    }

    pub fn max_y(&self) -> f32 {
        self.top.max(self.bottom)
    }

    /// Convert to display space for a page `page_height` PDF units tall.
    /// The x axis is shared by both systems.
    pub fn to_display(&self, page_height: f32) -> DisplayRect {
        DisplayRect {
            min_x: self.min_x(),
            min_y: page_height - self.max_y(),
            max_x: self.max_x(),
            max_y: page_height - self.min_y(),
        }
    }

    /// `true` when the PDF-space point lies inside the rectangle grown by
    /// `tolerance` on every side.
    pub fn contains(&self, x: f32, y: f32, tolerance: f32) -> bool {
        x >= self.min_x() - tolerance
            && x <= self.max_x() + tolerance
            && y >= self.min_y() - tolerance
            && y <= self.max_y() + tolerance
    }

    /// Like [`contains`](Self::contains) for a point given in display space
    /// (top-left origin, still in PDF units).
    pub fn contains_display(&self, x: f32, y: f32, page_height: f32, tolerance: f32) -> bool {
        self.to_display(page_height).contains(x, y, tolerance)
    }

    /// Per-edge comparison: every component differs by at most `tolerance`.
    pub fn matches_within(&self, other: &AnnotationGeometry, tolerance: f32) -> bool {
        (self.left - other.left).abs() <= tolerance
            && (self.top - other.top).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
    }
}

// ── DisplayRect ──────────────────────────────────────────────────────────────

/// A rectangle with a top-left origin, in PDF units.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct DisplayRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl DisplayRect {
    /// Convert back to PDF page space.
    pub fn to_pdf(&self, page_height: f32) -> AnnotationGeometry {
        AnnotationGeometry {
            left: self.min_x,
            top: page_height - self.min_y,
            right: self.max_x,
            bottom: page_height - self.max_y,
        }
    }

    pub fn contains(&self, x: f32, y: f32, tolerance: f32) -> bool {
        x >= self.min_x - tolerance
            && x <= self.max_x + tolerance
            && y >= self.min_y - tolerance
            && y <= self.max_y + tolerance
    }
}

// ── DisplayTransform ─────────────────────────────────────────────────────────

/// Relates a rendered page bitmap, as laid out on screen, to the page's native
/// PDF size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DisplayTransform {
    pub pdf_width: f32,
    pub pdf_height: f32,
    pub displayed_width: f32,
    pub displayed_height: f32,
}

impl DisplayTransform {
    pub fn new(pdf_width: f32, pdf_height: f32, displayed_width: f32, displayed_height: f32) -> Self {
        Self { pdf_width, pdf_height, displayed_width, displayed_height }
    }

    /// `(pdf_width / displayed_width, pdf_height / displayed_height)`, or
    /// `None` when the displayed size is degenerate.
    pub fn scale(&self) -> Option<(f32, f32)> {
        if self.displayed_width <= 0.0 || self.displayed_height <= 0.0 {
            return None;
        }
        Some((self.pdf_width / self.displayed_width, self.pdf_height / self.displayed_height))
    }

    /// Map a tap in displayed pixels to display space in PDF units.
    pub fn to_page_units(&self, tap_x: f32, tap_y: f32) -> Option<(f32, f32)> {
        let (sx, sy) = self.scale()?;
        Some((tap_x * sx, tap_y * sy))
    }
}

/// Width and height of a page's `/MediaBox` in PDF units. The first four
/// entries must all be numbers.
pub(crate) fn page_size(document: &Document, page: &Dictionary) -> Option<(f32, f32)> {
    let values = inherited_attribute(document, page, b"MediaBox")?.as_array().ok()?;
    if values.len() < 4 {
        return None;
    }

    let mut n = [0f32; 4];
    for (slot, value) in n.iter_mut().zip(values.iter()) {
        *slot = object_number(resolve(document, value)?)?;
    }
    let [llx, lly, urx, ury] = n;

    Some(((urx - llx).abs(), (ury - lly).abs()))
}

/// Find the asset on `page_index` whose hit region contains a tap.
///
/// The tap is given in displayed pixels and scaled into PDF units before it is
/// compared with each region grown by `tolerance`. When several regions
/// qualify, the first one in `assets` wins.
pub fn find_hit<'a>(
    assets: &'a [MediaAsset],
    page_index: usize,
    tap: (f32, f32),
    transform: &DisplayTransform,
    tolerance: f32,
) -> Option<&'a MediaAsset> {
    let (x, y) = transform.to_page_units(tap.0, tap.1)?;

    assets.iter().find(|asset| {
        asset.page_index == Some(page_index)
            && asset
                .hit_region
                .map(|r| r.contains_display(x, y, transform.pdf_height, tolerance))
                .unwrap_or(false)
    })
}
