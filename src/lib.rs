//! tilescope: deep-zoom image viewing core
//!
//! Streams tiles of a multi-resolution image pyramid into a spring-animated
//! viewport. Coarser levels stand in for finer ones while they load, at most
//! one tile load is issued per frame, and decoded tiles live in a bounded
//! cache.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tilescope::{AsyncFetcher, Point, RasterCanvas, Viewer, ViewerConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ViewerConfig::default();
//! let fetcher = AsyncFetcher::current(config.timeout_ms)?;
//! let mut viewer = Viewer::new(config, fetcher);
//!
//! let source = tilescope::source::load_config("pyramid/source.json").await?;
//! let container = Point::new(1280.0, 720.0);
//! viewer.open(source, container, viewer.elapsed_ms());
//!
//! let mut canvas = RasterCanvas::new(1280, 720);
//! viewer.run_until_settled(container, &mut canvas).await;
//! canvas.save("view.png")?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod events;
pub mod geometry;
pub mod input;
pub mod loader;
pub mod overlay;
pub mod profiler;
pub mod renderer;
pub mod source;
pub mod spring;
pub mod tile;
pub mod viewport;

// Re-export key types
pub use app::{OpenTicket, Viewer};
pub use config::{ConfigError, ViewerConfig};
pub use events::{EventKind, ViewerEvent};
pub use geometry::{Point, Rect};
pub use input::{ClickDetector, Gesture};
pub use loader::{AsyncFetcher, ImageFetcher, ImageLoader};
pub use overlay::{ElementId, OverlayLocation, Placement};
pub use renderer::{Drawer, Frame, RasterCanvas, RenderSurface};
pub use source::{SourceError, TileSource, TileSourceConfig};
pub use viewport::Viewport;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
