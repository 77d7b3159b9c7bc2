use std::collections::HashSet;
use std::path::PathBuf;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::classifier::{classify, head_of, sniff_signature};
use crate::geometry::AnnotationGeometry;
use crate::media::{MediaAsset, MediaKind, TimeWindow};
use crate::pdf_utils::{
    decoded_bytes, extract_name_from_dict, extract_string_from_dict, key_text, sanitize_file_component, stream_filters,
};
use crate::registry::{AddOutcome, MediaRegistry};
use crate::sidecar::SegmentMapping;
use crate::walker::{inherited_attribute, resolve, resolve_dict, resolve_with_id, ObjectWalker, StreamSite};
use crate::{ExtractError, ExtractorConfig, Result};

/// Runs every discovery strategy over one page and collects the result.
///
/// An engine is single use: it owns the page's [`MediaRegistry`] and is
/// consumed by [`ExtractionEngine::run`].
pub(crate) struct ExtractionEngine<'a> {
    pub(crate) document: &'a Document,
    pub(crate) config: &'a ExtractorConfig,
    pub(crate) page_index: usize,
    pub(crate) registry: MediaRegistry,
    cache_dir: PathBuf,
    sidecar: Option<&'a SegmentMapping>,
    xobjects_seen: HashSet<ObjectId>,
}

/// A classified stream ready to be written to the cache.
pub(crate) struct Candidate {
    pub kind: MediaKind,
    /// Asset label.
    pub name: String,
    /// File name without extension.
    pub file_stem: String,
    pub region: Option<AnnotationGeometry>,
    pub window: Option<TimeWindow>,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(
        document: &'a Document,
        config: &'a ExtractorConfig,
        page_index: usize,
        cache_dir: PathBuf,
        sidecar: Option<&'a SegmentMapping>,
    ) -> Self {
        Self {
            document,
            config,
            page_index,
            registry: MediaRegistry::new(config.sample_len),
            cache_dir,
            sidecar,
            xobjects_seen: HashSet::new(),
        }
    }

    /// Scan the page and return its de-duplicated assets.
    ///
    /// The three strategies always all run, in this order:
    /// 1. resource XObjects;
    /// 2. annotations, including the RichMedia structure;
    /// 3. a sweep of the page dictionary and its content streams.
    ///
    /// Only a cache directory that cannot be created is an error; everything
    /// below page level is logged and skipped.
    pub fn run(mut self, page_id: ObjectId) -> Result<Vec<MediaAsset>> {
        std::fs::create_dir_all(&self.cache_dir)?;

        let page = self
            .document
            .get_object(page_id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .ok_or_else(|| ExtractError::InvalidPdf(format!("page {} is not a dictionary", self.page_index)))?;

        if let Some(resources) = page_resources(self.document, page) {
            self.scan_xobjects(resources, 0);
        } else {
            debug!(page = self.page_index, "page has no resources");
        }

        self.scan_annotations(page);

        let label = format!("Page_{}", self.page_index);
        self.sweep_dict(page, &label, None);

        let assets = self.registry.into_assets();
        info!(
            page = self.page_index,
            assets = assets.len(),
            tappable = assets.iter().filter(|a| a.is_tappable()).count(),
            "page extraction finished"
        );
        Ok(assets)
    }

    // ── Strategy 1: resource XObjects ────────────────────────────────────────

    /// Inspect each entry of `resources /XObject`. Form XObjects recurse into
    /// their own resources up to the configured depth.
    fn scan_xobjects(&mut self, resources: &'a Dictionary, depth: usize) {
        if depth > self.config.max_depth {
            debug!(page = self.page_index, depth, "form nesting reached max depth");
            return;
        }
        let Some(xobjects) = resources.get(b"XObject").ok().and_then(|v| resolve_dict(self.document, v)) else {
            return;
        };

        for (index, (key, value)) in xobjects.iter().enumerate() {
            let name = key_text(key);
            let Some((id, resolved)) = resolve_with_id(self.document, value) else {
                debug!(page = self.page_index, xobject = %name, "unresolvable XObject skipped");
                continue;
            };
            if let Some(id) = id {
                if !self.xobjects_seen.insert(id) {
                    continue;
                }
            }

            match resolved {
                Object::Stream(stream) => self.inspect_xobject(&name, index, stream, depth),
                Object::Dictionary(dict) => {
                    let path = format!("XObject_{name}");
                    self.sweep_dict(dict, &path, None);
                }
                _ => {}
            }
        }
    }

    fn inspect_xobject(&mut self, name: &str, index: usize, stream: &'a Stream, depth: usize) {
        let subtype = extract_name_from_dict(&stream.dict, b"Subtype").unwrap_or_default();

        if subtype == "Image" {
            // Mislabelled media hides behind /Image; only large ones are worth a look.
            let bytes = decoded_bytes(stream);
            if bytes.len() > self.config.large_stream_len && sniff_signature(head_of(&bytes)).is_some() {
                self.try_extract_stream(stream, name, None, None);
            } else {
                self.extract_image(name, index, stream);
            }
            return;
        }

        if subtype == "Form" || name.starts_with("Fm") {
            let path = format!("Form_{name}");
            self.sweep_dict(&stream.dict, &path, None);
            if let Some(resources) = stream.dict.get(b"Resources").ok().and_then(|v| resolve_dict(self.document, v)) {
                self.scan_xobjects(resources, depth + 1);
            }
            self.try_extract_stream(stream, &path, None, None);
            return;
        }

        self.try_extract_stream(stream, name, None, None);
    }

    /// Decode an image XObject and store it as PNG.
    fn extract_image(&mut self, name: &str, index: usize, stream: &Stream) {
        let image = match decode_image(self.document, stream) {
            Ok(image) => image,
            Err(e) => {
                warn!(page = self.page_index, xobject = name, error = %e, "image XObject not decodable");
                return;
            }
        };

        let stem = format!("image_{}_{}_{}", self.page_index, name, index);
        let path = self.cache_path(&stem, MediaKind::Image);
        if let Err(e) = image.save_with_format(&path, ImageFormat::Png) {
            warn!(path = %path.display(), error = %e, "could not write image");
            return;
        }

        self.register(MediaAsset {
            name: format!("image_{}_{}", self.page_index, name),
            path,
            kind: MediaKind::Image,
            page_index: Some(self.page_index),
            hit_region: None,
            time_window: None,
        });
    }

    // ── Strategy 3: generic sweep ────────────────────────────────────────────

    /// Walk `dict` and offer every stream found to the classifier. Streams
    /// found this way carry `region` when it is set.
    pub(crate) fn sweep_dict(&mut self, dict: &'a Dictionary, path: &str, region: Option<AnnotationGeometry>) -> usize {
        let sites = ObjectWalker::new(self.document, self.config.max_depth).collect_streams(dict, path);
        self.check_sites(sites, region)
    }

    /// Like [`sweep_dict`](Self::sweep_dict) for an arbitrary root object.
    pub(crate) fn sweep_object(&mut self, root: &'a Object, path: &str, region: Option<AnnotationGeometry>) -> usize {
        let sites = ObjectWalker::new(self.document, self.config.max_depth).collect_from(root, path);
        self.check_sites(sites, region)
    }

    fn check_sites(&mut self, sites: Vec<StreamSite<'a>>, region: Option<AnnotationGeometry>) -> usize {
        sites
            .into_iter()
            .filter(|site| self.check_stream(site, region).is_some())
            .count()
    }

    /// Extract a swept stream when it holds audio or video.
    fn check_stream(&mut self, site: &StreamSite<'_>, region: Option<AnnotationGeometry>) -> Option<AddOutcome> {
        let bytes = decoded_bytes(site.stream);
        if bytes.len() <= self.config.min_stream_len {
            return None;
        }

        let subtype = extract_name_from_dict(&site.stream.dict, b"Subtype").unwrap_or_default();
        let kind = classify(head_of(&bytes), &subtype, "", &site.key).filter(|k| k.is_playable())?;

        let stem = format!("{}_stream_{}_{}_{}", kind.label(), self.page_index, site.key, self.registry.len());
        debug!(page = self.page_index, path = %site.path, key = %site.key, bytes = bytes.len(), "media stream found");
        self.materialize(
            &bytes,
            Candidate {
                kind,
                name: format!("{}_stream_{}", kind.label(), site.key),
                file_stem: stem,
                region,
                window: None,
            },
        )
    }

    /// Extract a stream reached by name when its content or metadata marks it
    /// as audio or video.
    pub(crate) fn try_extract_stream(
        &mut self,
        stream: &Stream,
        name: &str,
        region: Option<AnnotationGeometry>,
        window: Option<TimeWindow>,
    ) -> Option<AddOutcome> {
        let bytes = decoded_bytes(stream);
        if bytes.len() <= self.config.min_stream_len {
            return None;
        }

        let subtype = extract_name_from_dict(&stream.dict, b"Subtype").unwrap_or_default();
        let content_type = extract_string_from_dict(&stream.dict, b"ContentType").unwrap_or_default();
        let kind = classify(head_of(&bytes), &subtype, &content_type, name).filter(|k| k.is_playable())?;

        self.materialize(
            &bytes,
            Candidate {
                kind,
                name: format!("{}_{}", kind.label(), name),
                file_stem: format!("{}_{}_{}_{}", kind.label(), self.page_index, name, self.registry.len()),
                region,
                window,
            },
        )
    }

    // ── Materialization ──────────────────────────────────────────────────────

    /// Write `bytes` to the cache and offer the result to the registry.
    ///
    /// Tappable candidates without a time window get one from the sidecar
    /// mapping when a segment matches their rectangle.
    pub(crate) fn materialize(&mut self, bytes: &[u8], candidate: Candidate) -> Option<AddOutcome> {
        let window = candidate.window.or_else(|| {
            let region = candidate.region?;
            let mapping = self.sidecar?;
            let window = mapping.time_window_for(self.page_index, &region, self.config.sidecar_tolerance)?;
            debug!(page = self.page_index, name = %candidate.name, ?window, "time window from sidecar");
            Some(window)
        });

        let path = self.unclaimed_path(&candidate.file_stem, candidate.kind, bytes);
        if let Err(e) = std::fs::write(&path, bytes) {
            warn!(path = %path.display(), error = %e, "could not write media file");
            return None;
        }

        Some(self.register(MediaAsset {
            name: candidate.name,
            path,
            kind: candidate.kind,
            page_index: Some(self.page_index),
            hit_region: candidate.region,
            time_window: window,
        }))
    }

    fn register(&mut self, asset: MediaAsset) -> AddOutcome {
        let name = asset.name.clone();
        let outcome = self.registry.try_add(asset);
        debug!(page = self.page_index, name = %name, ?outcome, "candidate offered");
        outcome
    }

    /// Cache path for `stem`. A path already registered for different bytes
    /// gets a running suffix instead, so no asset's file is ever overwritten
    /// within one extraction.
    fn unclaimed_path(&self, stem: &str, kind: MediaKind, bytes: &[u8]) -> PathBuf {
        let mut path = self.cache_path(stem, kind);
        let mut counter = self.registry.len();
        while self.registry.contains_path(&path) && std::fs::read(&path).map_or(true, |existing| existing != bytes) {
            debug!(path = %path.display(), "cache path taken by different content");
            path = self.cache_path(&format!("{stem}_{counter}"), kind);
            counter += 1;
        }
        path
    }

    fn cache_path(&self, stem: &str, kind: MediaKind) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", sanitize_file_component(stem), kind.extension()))
    }
}

/// The page's `/Resources`, inherited from the page tree when absent.
pub(crate) fn page_resources<'a>(document: &'a Document, page: &'a Dictionary) -> Option<&'a Dictionary> {
    inherited_attribute(document, page, b"Resources").and_then(|r| r.as_dict().ok())
}

// ── Image decoding ───────────────────────────────────────────────────────────

/// Decode an image XObject.
///
/// JPEG data and container-encoded bytes go through the `image` decoders.
/// Raw 8-bit samples are rebuilt from `/Width`, `/Height` and the colour space
/// (gray, RGB or CMYK).
fn decode_image(document: &Document, stream: &Stream) -> Result<DynamicImage> {
    let filters = stream_filters(stream);
    if filters.last().map(String::as_str) == Some("DCTDecode") {
        let data = if filters.len() == 1 { stream.content.clone() } else { decoded_bytes(stream) };
        return image::load_from_memory(&data).map_err(|e| ExtractError::ImageDecode(e.to_string()));
    }
    if filters.iter().any(|f| f == "JPXDecode" || f == "JBIG2Decode" || f == "CCITTFaxDecode") {
        return Err(ExtractError::ImageDecode(format!("unsupported image filter {filters:?}")));
    }

    let data = decoded_bytes(stream);
    if let Some(image) = raw_samples_to_image(document, &stream.dict, &data) {
        return Ok(image);
    }
    image::load_from_memory(&data).map_err(|e| ExtractError::ImageDecode(e.to_string()))
}

fn raw_samples_to_image(document: &Document, dict: &Dictionary, data: &[u8]) -> Option<DynamicImage> {
    let int = |key: &[u8]| dict.get(key).ok().and_then(|v| resolve(document, v)).and_then(|v| v.as_i64().ok());

    let width = u32::try_from(int(b"Width")?).ok()?;
    let height = u32::try_from(int(b"Height")?).ok()?;
    if int(b"BitsPerComponent").unwrap_or(8) != 8 {
        return None;
    }

    let components = color_components(document, dict)?;
    let expected = width as usize * height as usize * components;
    if data.len() != expected {
        return None;
    }

    match components {
        1 => GrayImage::from_raw(width, height, data.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, data.to_vec()).map(DynamicImage::ImageRgb8),
        4 => {
            let rgb: Vec<u8> = data
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 255 - px[3] as u16;
                    [0usize, 1, 2].map(|i| ((255 - px[i] as u16) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
}

/// Components per pixel of the image's `/ColorSpace`.
fn color_components(document: &Document, dict: &Dictionary) -> Option<usize> {
    let cs = resolve(document, dict.get(b"ColorSpace").ok()?)?;
    match cs {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        // [/ICCBased stream]: /N on the profile stream.
        Object::Array(items) if items.first().and_then(|o| o.as_name().ok()) == Some(b"ICCBased".as_slice()) => {
            let profile = resolve(document, items.get(1)?)?.as_stream().ok()?;
            let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
            usize::try_from(n).ok()
        }
        _ => None,
    }
}
