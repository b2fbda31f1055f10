//! tilescope: headless deep-zoom viewer
//!
//! Opens a tile source, streams tiles until the view settles and writes the
//! composited frame as a PNG.
//!
//! Usage:
//!   tilescope <source.json> [config.json] [--zoom <f64>] [--size <W>x<H>] [-o <file>]

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tilescope::{AsyncFetcher, Point, RasterCanvas, Viewer, ViewerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

struct Args {
    source: PathBuf,
    config: Option<PathBuf>,
    zoom: f64,
    size: (u32, u32),
    output: Option<PathBuf>,
}

fn print_usage() {
    println!("tilescope v{}", tilescope::VERSION);
    println!();
    println!("Usage:");
    println!("  tilescope <source.json> [config.json] [--zoom <f64>] [--size <W>x<H>] [-o <file>]");
    println!();
    println!("Options:");
    println!("  --zoom <f64>          Zoom relative to the home view (default: 1)");
    println!("  --size <W>x<H>        Container size in pixels (default: 1280x720)");
    println!("  -o, --output <file>   Output PNG (default: timestamped file in Pictures)");
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut positional = Vec::new();
    let mut zoom = 1.0;
    let mut size = (1280, 720);
    let mut output = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--zoom" if i + 1 < args.len() => {
                zoom = args[i + 1].parse().context("Invalid --zoom")?;
                i += 2;
            }
            "--size" if i + 1 < args.len() => {
                let Some((w, h)) = args[i + 1].split_once('x') else {
                    bail!("Invalid --size {:?}, expected <W>x<H>", args[i + 1]);
                };
                size = (w.parse().context("Invalid --size width")?, h.parse().context("Invalid --size height")?);
                i += 2;
            }
            "-o" | "--output" if i + 1 < args.len() => {
                output = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
            arg => {
                positional.push(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    let mut positional = positional.into_iter();
    let Some(source) = positional.next() else {
        bail!("Missing tile source");
    };
    if zoom <= 0.0 {
        bail!("--zoom must be positive");
    }
    if size.0 == 0 || size.1 == 0 {
        bail!("--size must be non-zero");
    }
    Ok(Args {
        source,
        config: positional.next(),
        zoom,
        size,
        output,
    })
}

fn default_output() -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("tilescope_{}.png", timestamp);

    // Try Pictures, then current dir
    dirs::picture_dir().unwrap_or_else(|| PathBuf::from(".")).join(filename)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("tilescope v{}", tilescope::VERSION);

    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.is_empty() || raw.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            tracing::error!("{:#}", e);
            print_usage();
            return Err(e);
        }
    };

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path).context("Failed to load viewer config")?,
        None => ViewerConfig::default(),
    };

    let fetcher = AsyncFetcher::current(config.timeout_ms).context("Failed to create fetcher")?;
    let mut viewer = Viewer::new(config, fetcher);
    let container = Point::new(args.size.0 as f64, args.size.1 as f64);

    let ticket = viewer.begin_open();
    let source = tilescope::source::load_config(&args.source).await;
    viewer.finish_open(ticket, source, container, viewer.elapsed_ms());
    if !viewer.is_open() {
        bail!("Could not open {}", args.source.display());
    }

    if let Some(viewport) = viewer.viewport_mut() {
        viewport.zoom_by(args.zoom, None, true).apply_constraints(true);
    }

    let mut canvas = RasterCanvas::new(args.size.0, args.size.1);
    let frames = viewer.run_until_settled(container, &mut canvas).await;

    if let Some(profiler) = viewer.profiler() {
        let times = profiler.update_times();
        tracing::info!(
            "{} frames, update avg {:.2} ms (min {:.2}, max {:.2})",
            frames,
            times.avg,
            times.min,
            times.max
        );
    }

    let output = args.output.unwrap_or_else(default_output);
    canvas.save(&output)?;
    println!("Saved: {}", output.display());

    Ok(())
}
