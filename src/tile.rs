//! Tile state
//!
//! One cell of the pyramid. Tiles are created lazily by the drawer the
//! first time a frame touches them and live until the drawer is reset.

use crate::geometry::{Point, Rect};
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

/// Address of a tile in the pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: i32,
    pub x: i64,
    pub y: i64,
}

impl TileKey {
    pub const fn new(level: i32, x: i64, y: i64) -> Self {
        Self { level, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}_{}", self.level, self.x, self.y)
    }
}

/// Decoded tile image, shared between the drawer and the render surface
#[derive(Debug, Clone)]
pub struct Bitmap(Arc<RgbaImage>);

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    /// Solid-colour bitmap
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    /// True when both handles point at the same decoded image
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub key: TileKey,
    /// Placement in normalized image space
    pub bounds: Rect,
    /// False for tiles outside a sparse pyramid or that failed to load
    pub exists: bool,
    pub url: Option<String>,
    pub loaded: bool,
    pub loading: bool,
    pub image: Option<Bitmap>,
    /// Screen position in pixels, set each frame the tile is visited
    pub position: Point,
    pub size: Point,
    /// Frame time the fade-in began
    pub blend_start: Option<f64>,
    pub opacity: f64,
    /// Distance from the tile center to the viewport center, in pixels
    pub distance: f64,
    pub visibility: f64,
    pub being_drawn: bool,
    pub last_touch_time: f64,
}

impl Tile {
    pub fn new(key: TileKey, bounds: Rect, exists: bool, url: Option<String>) -> Self {
        Self {
            key,
            bounds,
            exists,
            url,
            loaded: false,
            loading: false,
            image: None,
            position: Point::ZERO,
            size: Point::ZERO,
            blend_start: None,
            opacity: 0.0,
            distance: 0.0,
            visibility: 0.0,
            being_drawn: false,
            last_touch_time: 0.0,
        }
    }

    /// Drop the bitmap; the tile may be loaded again later
    pub fn unload(&mut self) {
        self.image = None;
        self.loaded = false;
        self.loading = false;
        self.blend_start = None;
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}
