use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::validator::{validate_source, PdfValidator};
use crate::{ExtractError, Result};

/// Validation functionality for MediaExtractor.
impl super::MediaExtractor {
    // ── Validation ────────────────────────────────────────────────────────────

    /// Returns `Ok(true)` when `pdf_path` is a non-empty file that parses as a
    /// PDF with a catalog and at least one page, and `Ok(false)` when it is
    /// missing, empty, unparsable or structurally broken. Other failures are
    /// returned as errors.
    pub fn is_pdf<P: AsRef<Path>>(&self, pdf_path: P) -> Result<bool> {
        let pdf_path = pdf_path.as_ref();
        let checked = validate_source(pdf_path)
            .and_then(|_| Ok(Document::load(pdf_path)?))
            .and_then(|document| PdfValidator::new(&document).validate_pdf_structure());

        match checked {
            Err(ExtractError::InvalidPdf(reason)) => {
                debug!(pdf = %pdf_path.display(), reason = %reason, "not a usable PDF");
                Ok(false)
            }
            Err(ExtractError::ParseError(e)) => {
                debug!(pdf = %pdf_path.display(), error = %e, "not a parsable PDF");
                Ok(false)
            }
            other => other,
        }
    }

    /// Number of pages in the document. Valid page indices are
    /// `0..page_count`.
    pub fn page_count<P: AsRef<Path>>(&self, pdf_path: P) -> Result<usize> {
        let pdf_path = pdf_path.as_ref();
        validate_source(pdf_path)?;
        Ok(PdfValidator::new(&Document::load(pdf_path)?).page_count())
    }
}
