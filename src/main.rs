//! CLI tool for listing the audio, video and image assets embedded in PDF
//! pages, and for hit-testing a tap against their annotation rectangles.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use pdfmediaextract::{find_hit, DisplayTransform, ExtractorConfig, MediaAsset, MediaExtractor};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pdfmediaextract",
    about = "List the media embedded in PDF pages and where to tap to play it",
    version,
    arg_required_else_help = true
)]
struct Args {
    /// PDF document to scan
    pdf: PathBuf,

    /// 0-indexed page to scan [default: 0]
    #[arg(short, long, conflicts_with = "all")]
    page: Option<usize>,

    /// Scan every page
    #[arg(long)]
    all: bool,

    /// Directory extracted files are written to [default: <tmp>/pdf_media]
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Directory searched for a `<pdf file name>.json` time-range sidecar (repeatable)
    #[arg(long = "sidecar-dir", value_name = "DIR")]
    sidecar_dirs: Vec<PathBuf>,

    /// Traversal depth bound for the object graph walk [default: 5]
    #[arg(long)]
    max_depth: Option<usize>,

    /// Print the asset list as JSON
    #[arg(long)]
    json: bool,

    /// Tap position in displayed pixels
    #[arg(long, num_args = 2, value_names = ["X", "Y"], requires = "display", conflicts_with = "all")]
    tap: Option<Vec<f32>>,

    /// Size of the displayed page in pixels
    #[arg(long, num_args = 2, value_names = ["W", "H"], requires = "tap")]
    display: Option<Vec<f32>>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdfmediaextract=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("❌ Error: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ExtractorConfig {
        sidecar_directories: args.sidecar_dirs.clone(),
        ..Default::default()
    };
    if let Some(dir) = &args.cache_dir {
        config.cache_directory = dir.clone();
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    let extractor = MediaExtractor::new(config);

    let pages: Vec<(usize, Vec<MediaAsset>)> = if args.all {
        extractor.try_extract_all_media(&args.pdf)?.into_iter().enumerate().collect()
    } else {
        let page = args.page.unwrap_or(0);
        vec![(page, extractor.try_extract_page_media(&args.pdf, page)?)]
    };

    if let (Some(tap), Some(display)) = (&args.tap, &args.display) {
        let (page, assets) = &pages[0];
        let (width, height) = extractor.page_size(&args.pdf, *page)?;
        let transform = DisplayTransform::new(width, height, display[0], display[1]);
        let hit = find_hit(assets, *page, (tap[0], tap[1]), &transform, extractor.config().tap_tolerance);

        if args.json {
            println!("{}", serde_json::to_string_pretty(&hit)?);
        } else {
            match hit {
                Some(asset) => print_asset(asset),
                None => println!("ℹ️  No media at ({}, {}) on page {page}", tap[0], tap[1]),
            }
        }
        return Ok(());
    }

    if args.json {
        let listing: Vec<_> = pages
            .iter()
            .map(|(page, assets)| serde_json::json!({ "page": page, "assets": assets }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("🔍 Scanning PDF: {}", args.pdf.display());
    println!("{}", "─".repeat(60));

    let mut total = 0;
    for (page, assets) in &pages {
        if assets.is_empty() {
            if !args.all {
                println!("ℹ️  No media found on page {page}");
            }
            continue;
        }
        println!("\n📄 Page {page}: {} asset(s)", assets.len());
        for asset in assets {
            print_asset(asset);
        }
        total += assets.len();
    }

    println!("\n{}", "─".repeat(60));
    println!("📊 Summary:");
    println!("   • {total} asset(s) on {} page(s) scanned", pages.len());
    println!("   • Cache directory: {}", extractor.cache_dir_for(args.pdf.file_name().and_then(|n| n.to_str())).display());

    Ok(())
}

fn print_asset(asset: &MediaAsset) {
    println!("   🎞️  {:?} {}", asset.kind, asset.file_name().unwrap_or(&asset.name));
    if let Some(len) = asset.file_len() {
        println!("      📏 Size: {}", format_bytes(len));
    }
    if let Some(r) = &asset.hit_region {
        println!(
            "      👆 Tap region: left {:.1}, top {:.1}, right {:.1}, bottom {:.1}",
            r.left, r.top, r.right, r.bottom
        );
    }
    if let Some(w) = &asset.time_window {
        println!("      ⏱️  Window: {} ms → {} ms ({} ms)", w.start_ms, w.end_ms, w.duration_ms());
    }
    println!("      💾 {}", asset.path.display());
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
