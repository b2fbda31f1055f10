//! Tile sources
//!
//! A tile source describes an image pyramid: base dimensions, tile size,
//! overlap and level range, and maps `(level, x, y)` to a tile URL.
//!
//! - `Pyramid`: regular power-of-two deep-zoom pyramid, optionally sparse
//! - `Legacy`: one whole image per level, no sub-tiling
//!
//! Descriptor formats are not parsed here; sources are built from explicit
//! geometry (`TileSourceConfig`), typically deserialized from JSON.

mod legacy;
mod pyramid;

pub use legacy::*;
pub use pyramid::*;

use crate::geometry::{Point, Rect};
use anyhow::{Context, Result};
use glam::I64Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tile source construction errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },

    #[error("tile size must be positive")]
    ZeroTileSize,

    #[error("legacy source needs at least one level")]
    NoLevels,

    #[error("min level {min} exceeds max level {max}")]
    LevelRange { min: i32, max: i32 },

    #[error("unsupported tile source descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

/// Explicit source geometry, tagged by variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TileSourceConfig {
    Pyramid(PyramidConfig),
    Legacy(LegacyConfig),
}

/// Geometry shared by every variant
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidGeometry {
    /// Base (max level) image size in pixels
    pub dimensions: Point,
    pub tile_size: u32,
    pub tile_overlap: u32,
    pub min_level: i32,
    pub max_level: i32,
}

impl PyramidGeometry {
    pub fn new(
        width: f64,
        height: f64,
        tile_size: u32,
        tile_overlap: u32,
        min_level: Option<i32>,
        max_level: Option<i32>,
    ) -> Result<Self, SourceError> {
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            return Err(SourceError::InvalidDimensions { width, height });
        }
        if tile_size == 0 {
            return Err(SourceError::ZeroTileSize);
        }
        let min_level = min_level.unwrap_or(0);
        let max_level = max_level.unwrap_or_else(|| width.max(height).log2().ceil() as i32);
        if min_level > max_level {
            return Err(SourceError::LevelRange { min: min_level, max: max_level });
        }
        Ok(Self {
            dimensions: Point::new(width, height),
            tile_size,
            tile_overlap,
            min_level,
            max_level,
        })
    }

    pub fn contains_level(&self, level: i32) -> bool {
        level >= self.min_level && level <= self.max_level
    }
}

/// An image pyramid
#[derive(Debug, Clone, PartialEq)]
pub enum TileSource {
    Pyramid(PyramidSource),
    Legacy(LegacySource),
}

impl TileSource {
    /// Build a source from explicit geometry
    pub fn from_config(config: TileSourceConfig) -> Result<Self, SourceError> {
        match config {
            TileSourceConfig::Pyramid(c) => Ok(Self::Pyramid(PyramidSource::new(c)?)),
            TileSourceConfig::Legacy(c) => Ok(Self::Legacy(LegacySource::new(c)?)),
        }
    }

    /// Build a source from a JSON geometry document
    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        Self::from_config(serde_json::from_str(json)?)
    }

    pub fn geometry(&self) -> &PyramidGeometry {
        match self {
            Self::Pyramid(s) => &s.geometry,
            Self::Legacy(s) => &s.geometry,
        }
    }

    pub fn dimensions(&self) -> Point {
        self.geometry().dimensions
    }

    pub fn tile_size(&self) -> u32 {
        self.geometry().tile_size
    }

    pub fn tile_overlap(&self) -> u32 {
        self.geometry().tile_overlap
    }

    pub fn min_level(&self) -> i32 {
        self.geometry().min_level
    }

    pub fn max_level(&self) -> i32 {
        self.geometry().max_level
    }

    /// Width over height of the base image
    pub fn aspect_ratio(&self) -> f64 {
        let d = self.dimensions();
        d.x / d.y
    }

    /// Size of `level` relative to the base image
    pub fn level_scale(&self, level: i32) -> f64 {
        match self {
            Self::Pyramid(s) => s.level_scale(level),
            Self::Legacy(s) => s.level_scale(level),
        }
    }

    /// Tile columns and rows at `level`
    pub fn num_tiles(&self, level: i32) -> I64Vec2 {
        match self {
            Self::Pyramid(s) => s.num_tiles(level),
            Self::Legacy(s) => s.num_tiles(level),
        }
    }

    /// Normalized size of one level pixel
    pub fn pixel_ratio(&self, level: i32) -> Point {
        let scaled = self.dimensions() * self.level_scale(level);
        Point::new(1.0 / scaled.x, 1.0 / scaled.y)
    }

    /// Column and row of the tile containing a normalized point
    pub fn tile_at_point(&self, level: i32, point: Point) -> I64Vec2 {
        match self {
            Self::Pyramid(s) => s.tile_at_point(level, point),
            Self::Legacy(_) => I64Vec2::ZERO,
        }
    }

    /// Normalized placement of a tile, overlap included
    pub fn tile_bounds(&self, level: i32, x: i64, y: i64) -> Rect {
        match self {
            Self::Pyramid(s) => s.tile_bounds(level, x, y),
            Self::Legacy(s) => s.tile_bounds(level, x, y),
        }
    }

    pub fn tile_url(&self, level: i32, x: i64, y: i64) -> Option<String> {
        match self {
            Self::Pyramid(s) => Some(s.tile_url(level, x, y)),
            Self::Legacy(s) => s.tile_url(level),
        }
    }

    pub fn tile_exists(&self, level: i32, x: i64, y: i64) -> bool {
        match self {
            Self::Pyramid(s) => s.tile_exists(level, x, y),
            Self::Legacy(s) => s.tile_exists(level, x, y),
        }
    }
}

/// Bounds check shared by both variants
fn in_level_bounds(geometry: &PyramidGeometry, num_tiles: I64Vec2, level: i32, x: i64, y: i64) -> bool {
    geometry.contains_level(level) && x >= 0 && y >= 0 && x < num_tiles.x && y < num_tiles.y
}

/// Read a source geometry file asynchronously
///
/// A relative `tilesUrl` (or legacy level URL) that is not an http(s) URL is
/// resolved against the directory holding the file.
pub async fn load_config(path: impl AsRef<Path>) -> Result<TileSource> {
    let path = path.as_ref();
    tracing::info!("Loading tile source: {:?}", path);

    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read tile source {}", path.display()))?;
    let mut config: TileSourceConfig =
        serde_json::from_str(&json).map_err(SourceError::from).context("Failed to parse tile source")?;

    if let Some(base) = path.parent() {
        config.resolve_relative(base);
    }

    let source = TileSource::from_config(config)?;
    let d = source.dimensions();
    tracing::info!(
        "Tile source ready: {}x{}, tile {} (+{}), levels {}..={}",
        d.x,
        d.y,
        source.tile_size(),
        source.tile_overlap(),
        source.min_level(),
        source.max_level()
    );
    Ok(source)
}

impl TileSourceConfig {
    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |url: &mut String| {
            if !is_remote(url) && Path::new(url.as_str()).is_relative() {
                let mut joined = base.join(url.as_str()).to_string_lossy().to_string();
                if url.ends_with('/') && !joined.ends_with('/') {
                    joined.push('/');
                }
                *url = joined;
            }
        };
        match self {
            Self::Pyramid(c) => resolve(&mut c.tiles_url),
            Self::Legacy(c) => c.levels.iter_mut().for_each(|level| resolve(&mut level.url)),
        }
    }
}

/// True for URLs fetched over the network
pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tile_source() {
        let source = TileSource::from_json_str(
            r#"{ "type": "pyramid", "width": 256, "height": 256, "tileSize": 256, "tilesUrl": "t/" }"#,
        )
        .unwrap();
        let max = source.max_level();
        assert_eq!(max, 8);
        assert_eq!(source.num_tiles(max), I64Vec2::new(1, 1));
        assert!(source.tile_exists(max, 0, 0));
        assert!(!source.tile_exists(max, 1, 0));
    }

    #[test]
    fn test_level_scale_monotonic() {
        let source = TileSource::from_config(TileSourceConfig::Pyramid(PyramidConfig::new(5000.0, 3000.0, 254, 1)))
            .unwrap();
        let max = source.max_level();
        assert_eq!(source.level_scale(max), 1.0);
        for level in source.min_level()..max {
            assert!(source.level_scale(level) <= source.level_scale(level + 1));
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = TileSource::from_json_str(r#"{ "type": "zoomify", "width": 1 }"#).unwrap_err();
        assert!(matches!(err, SourceError::Descriptor(_)));
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(
            PyramidGeometry::new(0.0, 10.0, 256, 0, None, None),
            Err(SourceError::InvalidDimensions { .. })
        ));
        assert!(matches!(PyramidGeometry::new(10.0, 10.0, 0, 0, None, None), Err(SourceError::ZeroTileSize)));
        assert!(matches!(
            PyramidGeometry::new(10.0, 10.0, 256, 0, Some(5), Some(2)),
            Err(SourceError::LevelRange { min: 5, max: 2 })
        ));
    }

    #[tokio::test]
    async fn test_load_config_resolves_relative_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.json");
        std::fs::write(
            &path,
            r#"{ "type": "pyramid", "width": 512, "height": 256, "tileSize": 256, "tilesUrl": "tiles/", "format": "png" }"#,
        )
        .unwrap();

        let source = load_config(&path).await.unwrap();
        let url = source.tile_url(9, 1, 0).unwrap();
        assert!(url.starts_with(&dir.path().to_string_lossy().to_string()));
        assert!(url.ends_with("tiles/9/1_0.png"));
    }
}
