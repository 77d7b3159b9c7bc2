// Integration tests for pdfmediaextract.
//
// Every fixture is built in memory with lopdf, saved into a temporary
// directory, and scanned through the public API.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdfmediaextract::{
    find_hit, AnnotationGeometry, DisplayTransform, ExtractError, ExtractorConfig, MediaExtractor, MediaKind,
    TimeWindow,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

// ── Fixture helpers ───────────────────────────────────────────────────────────

fn text(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

fn numbers(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

fn mp3_bytes(len: usize) -> Vec<u8> {
    let mut v = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    v.resize(len, 0xA5);
    v.truncate(len);
    v
}

fn mp4_bytes(len: usize) -> Vec<u8> {
    let mut v = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00".to_vec();
    v.resize(len, 0x3C);
    v
}

/// Attach `pages` under a fresh page tree and catalog.
fn finish(doc: &mut Document, pages: Vec<Dictionary>) {
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = pages
        .into_iter()
        .map(|mut page| {
            page.set("Type", "Page");
            page.set("Parent", pages_id);
            page.set("MediaBox", numbers(&[0.0, 0.0, 612.0, 792.0]));
            doc.add_object(page).into()
        })
        .collect();
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }.into(),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);
}

fn save(doc: &mut Document, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    extractor: MediaExtractor,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut ExtractorConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let mut config = ExtractorConfig {
            cache_directory: root.join("cache"),
            ..Default::default()
        };
        adjust(&mut config);
        Self {
            _dir: dir,
            root,
            extractor: MediaExtractor::new(config),
        }
    }
}

/// One page whose only XObject is `stream`, stored as `/Snd`.
fn single_xobject_pdf(fx: &Fixture, stream: Stream, name: &str) -> PathBuf {
    let mut doc = Document::with_version("1.7");
    let id = doc.add_object(stream);
    finish(
        &mut doc,
        vec![dictionary! { "Resources" => dictionary! { "XObject" => dictionary! { "Snd" => id } } }],
    );
    save(&mut doc, &fx.root, name)
}

/// Scenario B document: one RichMedia annotation at `rect` whose asset is an
/// MP4 bound to a 2 s + 3 s MediaClip.
fn richmedia_document(rect: [f32; 4]) -> Document {
    let mut doc = Document::with_version("1.7");
    let data = doc.add_object(Stream::new(dictionary! { "Type" => "EmbeddedFile" }, mp4_bytes(5000)));
    let spec = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => text("intro.mp4"),
        "UF" => text("intro.mp4"),
        "EF" => dictionary! { "F" => data },
    });
    let annot = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "RichMedia",
        "Rect" => numbers(&rect),
        "RichMediaContent" => dictionary! {
            "Assets" => dictionary! { "Names" => vec![text("intro.mp4"), spec.into()] },
            "Instances" => vec![Object::Dictionary(dictionary! {
                "Type" => "RichMediaInstance",
                "Asset" => spec,
                "Params" => dictionary! {
                    "MediaClip" => dictionary! { "S" => Object::Real(2.0), "D" => Object::Real(3.0) },
                },
            })],
        },
    });
    finish(&mut doc, vec![dictionary! { "Annots" => vec![annot.into()] }]);
    doc
}

// ── ExtractorConfig ───────────────────────────────────────────────────────────

#[test]
fn default_config_matches_documented_limits() {
    let cfg = ExtractorConfig::default();
    assert_eq!(cfg.max_depth, 5);
    assert_eq!(cfg.min_stream_len, 100);
    assert_eq!(cfg.large_stream_len, 5000);
    assert_eq!(cfg.sample_len, 1024);
    assert_eq!(cfg.sidecar_tolerance, 5.0);
    assert!(cfg.sidecar_directories.is_empty());
}

// ── End-to-end scenarios ──────────────────────────────────────────────────────

#[test]
fn png_image_xobject_yields_one_image_asset() {
    let fx = Fixture::new();

    let mut png = Vec::new();
    image::RgbImage::from_pixel(6, 4, image::Rgb([10, 200, 30]))
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let mut doc = Document::with_version("1.7");
    let im = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 6,
            "Height" => 4,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        png,
    ));
    finish(
        &mut doc,
        vec![dictionary! { "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => im } } }],
    );
    let pdf = save(&mut doc, &fx.root, "picture.pdf");

    let assets = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].kind, MediaKind::Image);
    assert_eq!(assets[0].hit_region, None);
    assert_eq!(assets[0].page_index, Some(0));
    assert_eq!(assets[0].path.extension().and_then(|e| e.to_str()), Some("png"));

    let decoded = image::open(&assets[0].path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (6, 4));
}

#[test]
fn raw_gray_samples_are_written_as_png() {
    let fx = Fixture::new();
    let mut doc = Document::with_version("1.7");
    let im = doc.add_object(Stream::new(
        dictionary! { "Subtype" => "Image", "Width" => 16, "Height" => 16, "ColorSpace" => "DeviceGray", "BitsPerComponent" => 8 },
        (0..=255u8).collect(),
    ));
    finish(
        &mut doc,
        vec![dictionary! { "Resources" => dictionary! { "XObject" => dictionary! { "Im1" => im } } }],
    );
    let pdf = save(&mut doc, &fx.root, "gray.pdf");

    let assets = fx.extractor.extract_page_media(&pdf, 0);
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].file_name(), Some("image_0_Im1_0.png"));
    assert!(assets[0].path.starts_with(fx.root.join("cache").join("gray")));
}

#[test]
fn richmedia_asset_carries_rect_and_media_clip_window() {
    let fx = Fixture::new();
    let mut doc = richmedia_document([100.0, 500.0, 300.0, 650.0]);
    let pdf = save(&mut doc, &fx.root, "lesson.pdf");

    let assets = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    assert_eq!(assets.len(), 1);

    let asset = &assets[0];
    assert_eq!(asset.kind, MediaKind::Video);
    assert_eq!(asset.time_window, Some(TimeWindow::new(2000, 5000)));
    assert_eq!(asset.hit_region, Some(AnnotationGeometry::new(100.0, 650.0, 300.0, 500.0)));
    assert_eq!(asset.file_len(), Some(5000));
}

#[test]
fn sidecar_supplies_missing_time_window() {
    let fx = Fixture::with_config(|_| {});
    let sidecars = fx.root.join("sidecars");
    std::fs::create_dir_all(&sidecars).unwrap();
    std::fs::write(
        sidecars.join("course.pdf.json"),
        r#"{ "course.pdf": { "pages": [ { "pageNumber": 2, "segments": [
            { "rect": [10, 100, 50, 80], "startTime": 0, "endTime": 5000 }
        ] } ] } }"#,
    )
    .unwrap();
    let extractor = MediaExtractor::new(ExtractorConfig {
        sidecar_directories: vec![sidecars],
        ..fx.extractor.config().clone()
    });

    let mut doc = Document::with_version("1.7");
    let sound = doc.add_object(Stream::new(dictionary! { "Type" => "Sound" }, mp3_bytes(600)));
    let annot = doc.add_object(dictionary! {
        "Subtype" => "Sound",
        "Rect" => numbers(&[12.0, 82.0, 48.0, 98.0]),
        "Sound" => sound,
    });
    finish(&mut doc, vec![Dictionary::new(), dictionary! { "Annots" => vec![annot.into()] }]);
    let pdf = save(&mut doc, &fx.root, "course.pdf");

    let assets = extractor.try_extract_page_media(&pdf, 1).unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].kind, MediaKind::Audio);
    assert_eq!(assets[0].time_window, Some(TimeWindow::new(0, 5000)));

    // Same rectangle on page 0 has no segment.
    assert!(extractor.try_extract_page_media(&pdf, 0).unwrap().is_empty());
}

// ── Boundaries and error handling ─────────────────────────────────────────────

#[rstest]
#[case(99, 0)]
#[case(100, 0)]
#[case(101, 1)]
fn streams_must_exceed_the_minimum_length(#[case] len: usize, #[case] expected: usize) {
    let fx = Fixture::new();
    let pdf = single_xobject_pdf(&fx, Stream::new(Dictionary::new(), mp3_bytes(len)), "short.pdf");

    let assets = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    assert_eq!(assets.len(), expected);
}

#[test]
fn missing_and_empty_files_yield_no_assets() {
    let fx = Fixture::new();
    let empty = fx.root.join("empty.pdf");
    std::fs::write(&empty, b"").unwrap();
    let missing = fx.root.join("missing.pdf");

    assert!(fx.extractor.extract_page_media(&empty, 0).is_empty());
    assert!(fx.extractor.extract_page_media(&missing, 0).is_empty());
    assert!(matches!(
        fx.extractor.try_extract_page_media(&empty, 0),
        Err(ExtractError::InvalidPdf(_))
    ));
}

#[test]
fn garbage_input_is_a_parse_failure_not_a_panic() {
    let fx = Fixture::new();
    let junk = fx.root.join("junk.pdf");
    std::fs::write(&junk, b"this is not a pdf at all").unwrap();

    assert!(fx.extractor.try_extract_page_media(&junk, 0).is_err());
    assert!(fx.extractor.extract_page_media(&junk, 0).is_empty());
}

#[test]
fn is_pdf_is_false_for_non_documents() {
    let fx = Fixture::new();
    let junk = fx.root.join("junk.pdf");
    std::fs::write(&junk, b"this is not a pdf at all").unwrap();
    let empty = fx.root.join("empty.pdf");
    std::fs::write(&empty, b"").unwrap();

    assert!(!fx.extractor.is_pdf(&junk).unwrap());
    assert!(!fx.extractor.is_pdf(&empty).unwrap());
    assert!(!fx.extractor.is_pdf(fx.root.join("absent.pdf")).unwrap());
}

#[test]
fn page_out_of_range_is_reported() {
    let fx = Fixture::new();
    let mut doc = Document::with_version("1.7");
    finish(&mut doc, vec![Dictionary::new()]);
    let pdf = save(&mut doc, &fx.root, "one.pdf");

    assert_eq!(fx.extractor.page_count(&pdf).unwrap(), 1);
    assert!(fx.extractor.is_pdf(&pdf).unwrap());
    assert!(matches!(
        fx.extractor.try_extract_page_media(&pdf, 1),
        Err(ExtractError::PageOutOfRange { index: 1, count: 1 })
    ));
    assert!(fx.extractor.extract_page_media(&pdf, 7).is_empty());
}

#[test]
fn cyclic_object_graph_terminates() {
    let fx = Fixture::new();
    let mut doc = Document::with_version("1.7");
    let action = doc.new_object_id();
    let annot = doc.new_object_id();
    doc.objects.insert(
        action,
        dictionary! { "S" => "Rendition", "Next" => action, "Annot" => annot }.into(),
    );
    doc.objects.insert(
        annot,
        dictionary! {
            "Subtype" => "Screen",
            "Rect" => numbers(&[0.0, 0.0, 10.0, 10.0]),
            "A" => action,
            "Self" => annot,
        }
        .into(),
    );
    finish(&mut doc, vec![dictionary! { "Annots" => vec![annot.into()] }]);
    let pdf = save(&mut doc, &fx.root, "loop.pdf");

    assert!(fx.extractor.try_extract_page_media(&pdf, 0).unwrap().is_empty());
}

// ── Deduplication ─────────────────────────────────────────────────────────────

#[test]
fn repeated_extraction_is_idempotent() {
    let fx = Fixture::new();
    let mut doc = richmedia_document([100.0, 500.0, 300.0, 650.0]);
    let pdf = save(&mut doc, &fx.root, "again.pdf");

    let first = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    let second = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    assert_eq!(first, second);

    let cached = std::fs::read_dir(fx.extractor.cache_dir_for(Some("again.pdf"))).unwrap().count();
    assert_eq!(cached, first.len());
}

#[test]
fn same_bytes_found_by_two_paths_merge_into_one_tappable_asset() {
    let fx = Fixture::new();
    let mut doc = Document::with_version("1.7");
    let sound = doc.add_object(Stream::new(Dictionary::new(), mp3_bytes(2048)));
    let annot = doc.add_object(dictionary! {
        "Subtype" => "Sound",
        "Rect" => numbers(&[50.0, 50.0, 90.0, 80.0]),
        "Sound" => sound,
    });
    finish(
        &mut doc,
        vec![dictionary! {
            "Resources" => dictionary! { "XObject" => dictionary! { "Snd" => sound } },
            "Annots" => vec![annot.into()],
        }],
    );
    let pdf = save(&mut doc, &fx.root, "twice.pdf");

    let assets = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].kind, MediaKind::Audio);
    assert_eq!(assets[0].hit_region, Some(AnnotationGeometry::new(50.0, 80.0, 90.0, 50.0)));
}

#[test]
fn distinct_regions_keep_distinct_assets() {
    let fx = Fixture::new();
    let mut doc = Document::with_version("1.7");
    let sound = doc.add_object(Stream::new(Dictionary::new(), mp3_bytes(2048)));
    let annots: Vec<Object> = [[10.0, 10.0, 40.0, 40.0], [300.0, 10.0, 340.0, 40.0]]
        .iter()
        .map(|r| {
            let id: ObjectId = doc.add_object(dictionary! { "Subtype" => "Sound", "Rect" => numbers(r), "Sound" => sound });
            id.into()
        })
        .collect();
    finish(&mut doc, vec![dictionary! { "Annots" => annots }]);
    let pdf = save(&mut doc, &fx.root, "two-buttons.pdf");

    let assets = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();
    assert_eq!(assets.len(), 2);
    assert!(assets.iter().all(|a| a.is_tappable()));
}

// ── Loaded documents and hit-testing ──────────────────────────────────────────

#[test]
fn in_memory_document_round_trip() {
    let fx = Fixture::new();
    let mut doc = richmedia_document([100.0, 500.0, 300.0, 650.0]);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let loaded = Document::load_mem(&bytes).unwrap();
    let assets = fx.extractor.extract_document_page(&loaded, 0, Some("memory.pdf")).unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].time_window, Some(TimeWindow::new(2000, 5000)));
    assert!(assets[0].path.starts_with(fx.root.join("cache").join("memory")));
}

#[test]
fn tap_on_rendered_page_finds_the_annotation_asset() {
    let fx = Fixture::new();
    let mut doc = richmedia_document([100.0, 500.0, 300.0, 650.0]);
    let pdf = save(&mut doc, &fx.root, "tap.pdf");
    let assets = fx.extractor.try_extract_page_media(&pdf, 0).unwrap();

    let (width, height) = fx.extractor.page_size(&pdf, 0).unwrap();
    assert_eq!((width, height), (612.0, 792.0));

    // Rendered at half size: the rect spans x 50..150, y (792-650)/2..(792-500)/2 = 71..146.
    let transform = DisplayTransform::new(width, height, 306.0, 396.0);
    let tolerance = fx.extractor.config().tap_tolerance;

    let hit = find_hit(&assets, 0, (100.0, 100.0), &transform, tolerance).unwrap();
    assert_eq!(hit.kind, MediaKind::Video);
    assert!(find_hit(&assets, 0, (250.0, 350.0), &transform, tolerance).is_none());
    assert!(find_hit(&assets, 1, (100.0, 100.0), &transform, tolerance).is_none());
}
