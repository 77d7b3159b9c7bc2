use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{info, warn};

use crate::extraction_engine::ExtractionEngine;
use crate::geometry::page_size;
use crate::pdf_utils::sanitize_file_component;
use crate::sidecar::SegmentMapping;
use crate::validator::{validate_source, PdfValidator};
use crate::{ExtractError, ExtractorConfig, MediaAsset, Result};

// ── MediaExtractor ────────────────────────────────────────────────────────────

/// Entry point for per-page media extraction.
///
/// The extractor holds no document state: every call opens, scans and drops
/// the document, so one extractor can serve any number of files and threads.
///
/// # Example
///
/// ```no_run
/// use pdfmediaextract::{ExtractorConfig, MediaExtractor};
///
/// let cfg = ExtractorConfig {
///     cache_directory: "./media-cache".into(),
///     sidecar_directories: vec!["./mappings".into()],
///     ..Default::default()
/// };
/// let extractor = MediaExtractor::new(cfg);
///
/// match extractor.try_extract_page_media("lesson.pdf", 0) {
///     Ok(assets) => println!("{} assets", assets.len()),
///     Err(e) => eprintln!("cannot scan page: {e}"),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MediaExtractor {
    config: ExtractorConfig,
}

impl MediaExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    // ── Extraction ────────────────────────────────────────────────────────────

    /// Extract the media of one page (0-indexed).
    ///
    /// Never fails: a missing or unreadable file, a parse error or a page out
    /// of range is logged and yields an empty list. Use
    /// [`try_extract_page_media`](Self::try_extract_page_media) to see the
    /// error.
    pub fn extract_page_media<P: AsRef<Path>>(&self, pdf_path: P, page_index: usize) -> Vec<MediaAsset> {
        let pdf_path = pdf_path.as_ref();
        match self.try_extract_page_media(pdf_path, page_index) {
            Ok(assets) => assets,
            Err(e) => {
                warn!(pdf = %pdf_path.display(), page = page_index, error = %e, "page extraction failed");
                Vec::new()
            }
        }
    }

    /// Extract the media of one page, reporting document-level failures.
    ///
    /// Failures below page level (one broken annotation, an undecodable
    /// image) are still logged and skipped.
    pub fn try_extract_page_media<P: AsRef<Path>>(&self, pdf_path: P, page_index: usize) -> Result<Vec<MediaAsset>> {
        let pdf_path = pdf_path.as_ref();
        let document = self.load(pdf_path)?;
        let sidecar = SegmentMapping::load(pdf_path, &self.config.sidecar_directories);
        let source_name = pdf_path.file_name().and_then(|n| n.to_str());

        self.scan_page(&document, page_index, source_name, sidecar.as_ref())
    }

    /// Extract every page of a document, loading it once. The outer list is
    /// indexed by page.
    pub fn try_extract_all_media<P: AsRef<Path>>(&self, pdf_path: P) -> Result<Vec<Vec<MediaAsset>>> {
        let pdf_path = pdf_path.as_ref();
        let document = self.load(pdf_path)?;
        let sidecar = SegmentMapping::load(pdf_path, &self.config.sidecar_directories);
        let source_name = pdf_path.file_name().and_then(|n| n.to_str());

        (0..PdfValidator::new(&document).page_count())
            .map(|page| self.scan_page(&document, page, source_name, sidecar.as_ref()))
            .collect()
    }

    /// Run the page scan over a document that is already loaded.
    ///
    /// `source_name` is the PDF's file name. When given, it selects the cache
    /// subdirectory and the sidecar looked up in
    /// [`ExtractorConfig::sidecar_directories`].
    pub fn extract_document_page(
        &self,
        document: &Document,
        page_index: usize,
        source_name: Option<&str>,
    ) -> Result<Vec<MediaAsset>> {
        let sidecar = source_name.and_then(|name| SegmentMapping::load(Path::new(name), &self.config.sidecar_directories));
        self.scan_page(document, page_index, source_name, sidecar.as_ref())
    }

    /// Cache directory used for a document. Each named document gets its own
    /// subdirectory so equally named assets of different files do not clash.
    pub fn cache_dir_for(&self, source_name: Option<&str>) -> PathBuf {
        let stem = source_name
            .map(Path::new)
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str());
        match stem {
            Some(stem) => self.config.cache_directory.join(sanitize_file_component(stem)),
            None => self.config.cache_directory.clone(),
        }
    }

    /// Width and height of a page in PDF units, for building a
    /// [`DisplayTransform`](crate::DisplayTransform).
    pub fn page_size<P: AsRef<Path>>(&self, pdf_path: P, page_index: usize) -> Result<(f32, f32)> {
        let document = self.load(pdf_path.as_ref())?;
        let page_id = PdfValidator::new(&document).page_id(page_index)?;
        let page = document.get_dictionary(page_id)?;
        page_size(&document, page)
            .ok_or_else(|| ExtractError::InvalidPdf(format!("page {page_index} has no usable /MediaBox")))
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn load(&self, pdf_path: &Path) -> Result<Document> {
        let len = validate_source(pdf_path)?;
        let document = Document::load(pdf_path)?;
        info!(pdf = %pdf_path.display(), bytes = len, "document loaded");
        Ok(document)
    }

    fn scan_page(
        &self,
        document: &Document,
        page_index: usize,
        source_name: Option<&str>,
        sidecar: Option<&SegmentMapping>,
    ) -> Result<Vec<MediaAsset>> {
        let validator = PdfValidator::new(document);
        validator.validate_pdf_structure()?;
        let page_id = validator.page_id(page_index)?;

        let cache_dir = self.cache_dir_for(source_name);
        info!(
            page = page_index,
            pages = validator.page_count(),
            cache = %cache_dir.display(),
            sidecar = sidecar.is_some(),
            "scanning page"
        );
        ExtractionEngine::new(document, &self.config, page_index, cache_dir, sidecar).run(page_id)
    }
}
