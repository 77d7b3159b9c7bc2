//! Minimal CLI that lists the media of one PDF page and where it was cached.
//!
//! Usage:
//!   cargo run --example extract_page_media -- lesson.pdf
//!   cargo run --example extract_page_media -- lesson.pdf 3 ./cache

use pdfmediaextract::{ExtractorConfig, MediaExtractor};
use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [page_index] [cache_dir]", args[0]);
        process::exit(1);
    }

    let pdf_path = &args[1];
    let page: usize = args.get(2).and_then(|p| p.parse().ok()).unwrap_or(0);

    let mut config = ExtractorConfig::default();
    if let Some(dir) = args.get(3) {
        config.cache_directory = dir.into();
    }
    let extractor = MediaExtractor::new(config);

    // 1. Is it a usable PDF?
    match extractor.page_count(pdf_path) {
        Ok(count) => println!("✓ {count} page(s)"),
        Err(e) => {
            eprintln!("✗ Not a usable PDF: {e}");
            process::exit(1);
        }
    }

    // 2. Scan the page.
    let assets = extractor.try_extract_page_media(pdf_path, page).unwrap_or_else(|e| {
        eprintln!("Extraction error: {e}");
        process::exit(1);
    });

    if assets.is_empty() {
        println!("  No media on page {page}.");
        return;
    }

    for (i, asset) in assets.iter().enumerate() {
        println!("\n  Asset #{}", i + 1);
        println!("    Name : {}", asset.name);
        println!("    Kind : {:?}", asset.kind);
        if let Some(len) = asset.file_len() {
            println!("    Size : {len} bytes");
        }
        if let Some(window) = asset.time_window {
            println!("    Clip : {} ms - {} ms", window.start_ms, window.end_ms);
        }
        match asset.hit_region {
            Some(r) => println!("    Tap  : [{} {} {} {}]", r.left, r.top, r.right, r.bottom),
            None => println!("    Tap  : not tappable"),
        }
        println!("    ✓ Cached at {}", asset.path.display());
    }
}
