//! Annotation strategy of [`ExtractionEngine`]: Movie, Sound, RichMedia and
//! Screen annotations, plus sweeps of whatever else an annotation holds.
//!
//! Every asset found here carries the annotation's rectangle as its hit
//! region.

use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};

use crate::classifier::{classify, head_of};
use crate::extraction_engine::{Candidate, ExtractionEngine};
use crate::file_discovery::{asset_name_for, AssetDiscovery, NamedAsset};
use crate::file_parsing::FileSpecParser;
use crate::geometry::AnnotationGeometry;
use crate::media::{MediaKind, TimeWindow};
use crate::media_clip::time_window_from_media_clip;
use crate::pdf_utils::{decoded_bytes, extract_name_from_dict, key_text, object_text};
use crate::registry::AddOutcome;
use crate::walker::{resolve, resolve_array, resolve_dict, resolve_stream};

/// Stream-valued annotation keys are only inspected above this size.
const DIRECT_STREAM_MIN_LEN: usize = 1000;

impl<'a> ExtractionEngine<'a> {
    /// Run every annotation strategy over the page's `/Annots`.
    pub(crate) fn scan_annotations(&mut self, page: &'a Dictionary) {
        let Some(annots) = page.get(b"Annots").ok().and_then(|v| resolve_array(self.document, v)) else {
            debug!(page = self.page_index, "page has no annotations");
            return;
        };

        for (index, annot) in annots.iter().enumerate() {
            match resolve_dict(self.document, annot) {
                Some(annotation) => self.process_annotation(annotation, index),
                None => debug!(page = self.page_index, index, "annotation is not a dictionary"),
            }
        }
    }

    fn process_annotation(&mut self, annotation: &'a Dictionary, index: usize) {
        let subtype = extract_name_from_dict(annotation, b"Subtype").unwrap_or_default();
        let region = AnnotationGeometry::from_annotation(self.document, annotation);
        let label = format!("Annotation_{}_{}", self.page_index, index);
        debug!(page = self.page_index, index, subtype = %subtype, ?region, "inspecting annotation");

        if let Ok(action) = annotation.get(b"A") {
            self.sweep_object(action, &format!("{label}_Action"), region);
        }
        if let Ok(settings) = annotation.get(b"RichMediaSettings") {
            self.sweep_object(settings, &format!("{label}_RichMediaSettings"), region);
        }

        match subtype.as_str() {
            "Movie" => self.extract_movie(annotation, index, region),
            "Sound" => self.extract_sound(annotation, index, region),
            "RichMedia" | "Screen" => self.extract_rich_media(annotation, index, region),
            _ => {}
        }

        self.extract_direct_streams(annotation, index, region);

        if region.is_some() {
            self.sweep_dict(annotation, &format!("{label}_Full"), region);
        }
    }

    // ── Movie and Sound ──────────────────────────────────────────────────────

    /// `/Movie → /F`, a file specification or a stream.
    fn extract_movie(&mut self, annotation: &'a Dictionary, index: usize, region: Option<AnnotationGeometry>) {
        let Some(file) = annotation
            .get(b"Movie")
            .ok()
            .and_then(|m| resolve_dict(self.document, m))
            .and_then(|m| m.get(b"F").ok())
        else {
            debug!(page = self.page_index, index, "movie annotation without /Movie /F");
            return;
        };
        let stem = format!("video_movie_{}_{}", self.page_index, index);
        self.extract_file_with_default(file, &stem, MediaKind::Video, region);
    }

    /// `/Sound`, either a sound stream or a dictionary holding one under
    /// `/Contents` or `/F`.
    fn extract_sound(&mut self, annotation: &'a Dictionary, index: usize, region: Option<AnnotationGeometry>) {
        let Ok(sound) = annotation.get(b"Sound") else {
            debug!(page = self.page_index, index, "sound annotation without /Sound");
            return;
        };
        let stem = format!("audio_sound_{}_{}", self.page_index, index);
        self.extract_file_with_default(sound, &stem, MediaKind::Audio, region);
    }

    /// Extract a file specification whose kind is implied by the annotation
    /// type unless the content says otherwise.
    fn extract_file_with_default(
        &mut self,
        file: &'a Object,
        stem: &str,
        default_kind: MediaKind,
        region: Option<AnnotationGeometry>,
    ) -> Option<AddOutcome> {
        let embedded = match FileSpecParser::new(self.document).parse_file_spec(stem, file) {
            Ok(embedded) => embedded,
            Err(e) => {
                debug!(page = self.page_index, error = %e, "no embedded data");
                return None;
            }
        };

        let bytes = decoded_bytes(embedded.stream);
        if bytes.len() <= self.config.min_stream_len {
            debug!(page = self.page_index, name = stem, bytes = bytes.len(), "stream too short");
            return None;
        }

        let kind = classify(
            head_of(&bytes),
            "",
            embedded.content_type.as_deref().unwrap_or_default(),
            embedded.file_name.as_deref().unwrap_or_default(),
        )
        .filter(|k| k.is_playable())
        .unwrap_or(default_kind);

        self.materialize(
            &bytes,
            Candidate {
                kind,
                name: stem.to_string(),
                file_stem: stem.to_string(),
                region,
                window: None,
            },
        )
    }

    /// Streams stored directly under an annotation key.
    fn extract_direct_streams(&mut self, annotation: &'a Dictionary, index: usize, region: Option<AnnotationGeometry>) {
        for (key, value) in annotation.iter() {
            let Some(stream) = resolve_stream(self.document, value) else {
                continue;
            };
            let bytes = decoded_bytes(stream);
            if bytes.len() <= DIRECT_STREAM_MIN_LEN {
                continue;
            }

            let key = key_text(key);
            let subtype = extract_name_from_dict(&stream.dict, b"Subtype").unwrap_or_default();
            let Some(kind) = classify(head_of(&bytes), &subtype, "", &key).filter(|k| k.is_playable()) else {
                continue;
            };
            let name = format!("{}_annotation_{}_{}", kind.label(), self.page_index, key);
            self.materialize(
                &bytes,
                Candidate {
                    kind,
                    file_stem: format!("{name}_{index}"),
                    name,
                    region,
                    window: None,
                },
            );
        }
    }

    // ── RichMedia ────────────────────────────────────────────────────────────

    /// Follow `RichMediaContent`: the `/Assets` tree, the `/Instances` that
    /// bind MediaClip windows to assets, and each `/Configurations` entry.
    /// Falls back to a sweep of the whole content dictionary when none of
    /// these yields anything.
    fn extract_rich_media(&mut self, annotation: &'a Dictionary, index: usize, region: Option<AnnotationGeometry>) {
        let Some(content) = annotation
            .get(b"RichMediaContent")
            .ok()
            .and_then(|c| resolve_dict(self.document, c))
        else {
            debug!(page = self.page_index, index, "annotation without RichMediaContent");
            return;
        };

        let assets = content
            .get(b"Assets")
            .map(|a| AssetDiscovery::new(self.document).collect_assets(a))
            .unwrap_or_default();
        debug!(page = self.page_index, index, assets = assets.len(), "RichMedia assets discovered");

        let mut found = 0;
        for asset in &assets {
            if self.extract_named_asset(asset, index, region, None).is_some() {
                found += 1;
            }
        }

        if let Ok(instances) = content.get(b"Instances") {
            found += self.process_instances(instances, "content", &assets, index, region);
        }

        if let Ok(configurations) = content.get(b"Configurations") {
            for (ci, config) in dict_entries(self.document, configurations).into_iter().enumerate() {
                if let Ok(instances) = config.get(b"Instances") {
                    let scope = format!("config{ci}");
                    found += self.process_instances(instances, &scope, &assets, index, region);
                }
                let label = format!("RichMedia_Config_{}_{}", self.page_index, ci);
                found += self.sweep_dict(config, &label, region);
            }
        }

        if found == 0 {
            let label = format!("RichMedia_Comprehensive_{}_{}", self.page_index, index);
            self.sweep_dict(content, &label, region);
        }
    }

    /// Bind each instance's MediaClip window to the asset it plays.
    /// `scope` names the list the instances come from.
    fn process_instances(
        &mut self,
        instances: &'a Object,
        scope: &str,
        assets: &[NamedAsset<'a>],
        annot_index: usize,
        region: Option<AnnotationGeometry>,
    ) -> usize {
        let mut found = 0;
        for (ii, instance) in dict_entries(self.document, instances).into_iter().enumerate() {
            let window = instance
                .get(b"Params")
                .ok()
                .and_then(|p| resolve_dict(self.document, p))
                .and_then(|p| p.get(b"MediaClip").ok())
                .and_then(|c| resolve_dict(self.document, c))
                .and_then(|clip| time_window_from_media_clip(self.document, clip));

            let Ok(asset_ref) = instance.get(b"Asset") else {
                continue;
            };
            let Some(asset) = self.instance_asset(asset_ref, assets, scope, ii) else {
                debug!(page = self.page_index, instance = ii, "instance asset not resolvable");
                continue;
            };
            if self.extract_named_asset(&asset, annot_index, region, window).is_some() {
                found += 1;
            }
        }
        found
    }

    /// The asset an instance's `/Asset` entry designates. References are
    /// mapped back to their tree name so the file lands on the same cache
    /// path as the tree entry. Assets outside the tree are named after their
    /// object id, or after their position when stored inline.
    fn instance_asset(
        &self,
        asset_ref: &'a Object,
        assets: &[NamedAsset<'a>],
        scope: &str,
        instance: usize,
    ) -> Option<NamedAsset<'a>> {
        if let Object::Reference(id) = asset_ref {
            if let Some(name) = asset_name_for(assets, *id) {
                return assets.iter().find(|a| a.name == name).cloned();
            }
        }

        if let Some(name) = resolve(self.document, asset_ref).and_then(object_text) {
            return assets.iter().find(|a| a.name == name).cloned();
        }

        let id = asset_ref.as_reference().ok();
        let name = match id {
            Some((number, generation)) => format!("object_{number}_{generation}"),
            None => format!("{scope}_instance_{instance}"),
        };
        Some(NamedAsset {
            name,
            value: asset_ref,
            id,
        })
    }

    /// Extract one named RichMedia asset.
    fn extract_named_asset(
        &mut self,
        asset: &NamedAsset<'a>,
        annot_index: usize,
        region: Option<AnnotationGeometry>,
        window: Option<TimeWindow>,
    ) -> Option<AddOutcome> {
        let embedded = match FileSpecParser::new(self.document).parse_file_spec(&asset.name, asset.value) {
            Ok(embedded) => embedded,
            Err(e) => {
                warn!(page = self.page_index, asset = %asset.name, error = %e, "RichMedia asset has no data");
                if let Some(spec) = resolve_dict(self.document, asset.value) {
                    let label = format!("FileSpec_{}_{}", self.page_index, asset.name);
                    self.sweep_dict(spec, &label, region);
                }
                return None;
            }
        };

        let bytes = decoded_bytes(embedded.stream);
        if bytes.len() <= self.config.min_stream_len {
            debug!(page = self.page_index, asset = %asset.name, bytes = bytes.len(), "asset too short");
            return None;
        }

        let file_name = embedded.file_name.as_deref().unwrap_or(&asset.name);
        let Some(kind) = classify(
            head_of(&bytes),
            "",
            embedded.content_type.as_deref().unwrap_or_default(),
            file_name,
        )
        .filter(|k| k.is_playable()) else {
            debug!(page = self.page_index, asset = %asset.name, "asset is not audio or video");
            return None;
        };

        let name = format!("{}_richmedia_{}_{}", kind.label(), self.page_index, asset.name);
        debug!(page = self.page_index, asset = %asset.name, embedded = embedded.embedded, ?window, "RichMedia asset found");
        self.materialize(
            &bytes,
            Candidate {
                kind,
                file_stem: format!("{name}_{annot_index}"),
                name,
                region,
                window,
            },
        )
    }
}

/// Dictionaries of an `/Instances` or `/Configurations` entry: an array of
/// dictionaries, a single dictionary, or a dictionary keyed by name.
fn dict_entries<'a>(document: &'a Document, obj: &'a Object) -> Vec<&'a Dictionary> {
    match resolve(document, obj) {
        Some(Object::Array(items)) => items.iter().filter_map(|i| resolve_dict(document, i)).collect(),
        Some(Object::Dictionary(dict))
            if dict.has(b"Type") || dict.has(b"Instances") || dict.has(b"Asset") || dict.has(b"Params") =>
        {
            vec![dict]
        }
        Some(Object::Dictionary(dict)) => dict.iter().filter_map(|(_, v)| resolve_dict(document, v)).collect(),
        _ => Vec::new(),
    }
}
