use std::path::Path;

use lopdf::{Document, ObjectId};

use crate::{ExtractError, Result};

// ── Source file checks ────────────────────────────────────────────────────────

/// Check that `path` names a readable, non-empty file before handing it to
/// lopdf. Returns the file length.
pub(crate) fn validate_source(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        ExtractError::InvalidPdf(format!("cannot open {}: {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(ExtractError::InvalidPdf(format!("{} is not a file", path.display())));
    }
    if metadata.len() == 0 {
        return Err(ExtractError::InvalidPdf(format!("{} is empty", path.display())));
    }

    Ok(metadata.len())
}

// ── PdfValidator ──────────────────────────────────────────────────────────────
//
// This is an internal type.  Callers use MediaExtractor, which delegates here.

pub(crate) struct PdfValidator<'a> {
    document: &'a Document,
}

impl<'a> PdfValidator<'a> {
    pub(crate) fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `Ok(true)` when the parsed document looks structurally valid:
    /// a catalog and at least one page.
    pub(crate) fn validate_pdf_structure(&self) -> Result<bool> {
        self.document
            .catalog()
            .map_err(|e| ExtractError::InvalidPdf(format!("missing or invalid catalog: {e}")))?;

        if self.document.get_pages().is_empty() {
            return Err(ExtractError::InvalidPdf("document has no pages".into()));
        }

        Ok(true)
    }

    pub(crate) fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Object id of the 0-indexed page `index`.
    pub(crate) fn page_id(&self, index: usize) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        // lopdf numbers pages from 1.
        let number = u32::try_from(index + 1).map_err(|_| ExtractError::PageOutOfRange {
            index,
            count: pages.len(),
        })?;

        pages.get(&number).copied().ok_or(ExtractError::PageOutOfRange {
            index,
            count: pages.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use tempfile::TempDir;

    fn two_page_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let a = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id });
        let b = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id });
        doc.objects.insert(
            pages_id,
            dictionary! { "Type" => "Pages", "Kids" => vec![a.into(), b.into()], "Count" => 2 }.into(),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc
    }

    #[test]
    fn page_ids_are_zero_indexed() {
        let doc = two_page_document();
        let validator = PdfValidator::new(&doc);

        assert!(validator.validate_pdf_structure().unwrap());
        assert_eq!(validator.page_count(), 2);
        assert!(validator.page_id(1).is_ok());
        assert!(matches!(
            validator.page_id(2),
            Err(ExtractError::PageOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn document_without_catalog_is_invalid() {
        let doc = Document::with_version("1.5");
        assert!(matches!(
            PdfValidator::new(&doc).validate_pdf_structure(),
            Err(ExtractError::InvalidPdf(_))
        ));
    }

    #[test]
    fn missing_and_empty_sources_are_rejected() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.pdf");
        std::fs::write(&empty, b"").unwrap();

        assert!(matches!(validate_source(&empty), Err(ExtractError::InvalidPdf(_))));
        assert!(matches!(validate_source(&dir.path().join("absent.pdf")), Err(ExtractError::InvalidPdf(_))));
        assert!(matches!(validate_source(dir.path()), Err(ExtractError::InvalidPdf(_))));
    }
}
