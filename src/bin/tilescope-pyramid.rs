//! Pyramid cutter - CLI tool to tile an image for tilescope
//!
//! Usage:
//!   tilescope-pyramid photo.jpg out/ --tile-size 254 --overlap 1 --format jpg
//!
//! Writes `out/tiles/{level}/{x}_{y}.{format}` for every level from 0 (1x1
//! pixels) up to the full-resolution image, plus `out/source.json`
//! describing the pyramid.

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tilescope::source::{PyramidConfig, TileSourceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const TILES_DIR: &str = "tiles";

#[derive(Debug, Clone, PartialEq)]
struct CutOptions {
    tile_size: u32,
    overlap: u32,
    format: String,
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            tile_size: 254,
            overlap: 1,
            format: "jpg".to_string(),
        }
    }
}

fn print_usage() {
    println!("tilescope pyramid cutter");
    println!("========================");
    println!();
    println!("Usage:");
    println!("  tilescope-pyramid <image> <out_dir> [--tile-size <u32>] [--overlap <u32>] [--format png|jpg]");
    println!();
    println!("Options:");
    println!("  --tile-size <u32>   Tile edge without overlap (default: 254)");
    println!("  --overlap <u32>     Pixels shared with each neighbour (default: 1)");
    println!("  --format <ext>      Tile encoding, png or jpg (default: jpg)");
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let input = PathBuf::from(&args[0]);
    let out_dir = PathBuf::from(&args[1]);
    let options = parse_options(&args[2..])?;

    let image = image::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let config = cut_pyramid(&image.to_rgba8(), &out_dir, &options)?;

    println!("Created: {}", out_dir.join("source.json").display());
    println!("   Size: {}x{}", config.width, config.height);
    println!("   Tile: {} (+{} overlap), {}", config.tile_size, config.tile_overlap, config.format);
    Ok(())
}

fn parse_options(args: &[String]) -> Result<CutOptions> {
    let mut options = CutOptions::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--tile-size" if i + 1 < args.len() => {
                options.tile_size = args[i + 1].parse().context("Invalid --tile-size")?;
                i += 2;
            }
            "--overlap" if i + 1 < args.len() => {
                options.overlap = args[i + 1].parse().context("Invalid --overlap")?;
                i += 2;
            }
            "--format" if i + 1 < args.len() => {
                options.format = args[i + 1].to_lowercase();
                i += 2;
            }
            other => bail!("Unknown option: {}", other),
        }
    }

    if options.tile_size == 0 {
        bail!("--tile-size must be positive");
    }
    if options.overlap >= options.tile_size {
        bail!("--overlap must be smaller than --tile-size");
    }
    if !matches!(options.format.as_str(), "png" | "jpg" | "jpeg") {
        bail!("Unsupported format: {}", options.format);
    }
    Ok(options)
}

/// Cut every level of `image` into `out_dir` and write its `source.json`
fn cut_pyramid(image: &RgbaImage, out_dir: &Path, options: &CutOptions) -> Result<PyramidConfig> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        bail!("Image is empty");
    }
    let max_level = (width.max(height) as f64).log2().ceil() as i32;

    let mut level_image = image.clone();
    let mut tiles = 0;
    for level in (0..=max_level).rev() {
        tiles += cut_level(&level_image, &out_dir.join(TILES_DIR).join(level.to_string()), options)?;
        tracing::debug!("Level {}: {}x{}", level, level_image.width(), level_image.height());

        // next level down, rounding up like the viewer's tile counts
        let (w, h) = level_image.dimensions();
        level_image = imageops::resize(&level_image, w.div_ceil(2), h.div_ceil(2), FilterType::Triangle);
    }

    let mut config = PyramidConfig::new(width as f64, height as f64, options.tile_size, options.overlap);
    config.tiles_url = format!("{}/", TILES_DIR);
    config.format = options.format.clone();

    let json = serde_json::to_string_pretty(&TileSourceConfig::Pyramid(config.clone()))?;
    let source_path = out_dir.join("source.json");
    fs::write(&source_path, json).with_context(|| format!("Failed to write {}", source_path.display()))?;

    tracing::info!("Wrote {} tiles over {} levels", tiles, max_level + 1);
    Ok(config)
}

/// Write one level's tiles; returns how many were written
fn cut_level(level_image: &RgbaImage, dir: &Path, options: &CutOptions) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let (width, height) = level_image.dimensions();
    let tile_size = options.tile_size;
    let columns = width.div_ceil(tile_size);
    let rows = height.div_ceil(tile_size);

    for x in 0..columns {
        for y in 0..rows {
            let (px, sx) = tile_span(x, tile_size, options.overlap, width);
            let (py, sy) = tile_span(y, tile_size, options.overlap, height);
            let tile = imageops::crop_imm(level_image, px, py, sx, sy).to_image();

            let path = dir.join(format!("{}_{}.{}", x, y, options.format));
            let encoded = match options.format.as_str() {
                // jpeg has no alpha channel
                "jpg" | "jpeg" => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(tile).to_rgb8()),
                _ => DynamicImage::ImageRgba8(tile),
            };
            encoded.save(&path).with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }
    Ok((columns * rows) as usize)
}

/// Pixel offset and length of tile `index` along one axis, overlap included
fn tile_span(index: u32, tile_size: u32, overlap: u32, extent: u32) -> (u32, u32) {
    let start = if index == 0 { 0 } else { tile_size * index - overlap };
    let length = tile_size + if index == 0 { 1 } else { 2 } * overlap;
    (start, length.min(extent - start))
}
