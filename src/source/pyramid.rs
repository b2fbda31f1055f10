//! Power-of-two deep-zoom pyramid
//!
//! Level `max_level` is the full-resolution image; each level below halves
//! both dimensions. Tiles are `tile_size` square plus `tile_overlap` pixels
//! shared with each neighbour. Display rectangles optionally restrict which
//! tiles exist, for sparse or partially-available pyramids.

use super::{in_level_bounds, PyramidGeometry, SourceError};
use crate::geometry::{Point, Rect};
use glam::I64Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Region of a sparse pyramid, in max-level pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub min_level: i32,
    pub max_level: i32,
}

impl DisplayRect {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Pyramid geometry as written in a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidConfig {
    pub width: f64,
    pub height: f64,
    pub tile_size: u32,
    #[serde(default)]
    pub tile_overlap: u32,
    #[serde(default)]
    pub min_level: Option<i32>,
    #[serde(default)]
    pub max_level: Option<i32>,
    /// Prefix of every tile URL, usually ending in `/`
    #[serde(default)]
    pub tiles_url: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub display_rects: Vec<DisplayRect>,
}

fn default_format() -> String {
    "jpg".to_string()
}

impl PyramidConfig {
    pub fn new(width: f64, height: f64, tile_size: u32, tile_overlap: u32) -> Self {
        Self {
            width,
            height,
            tile_size,
            tile_overlap,
            min_level: None,
            max_level: None,
            tiles_url: String::new(),
            format: default_format(),
            display_rects: Vec::new(),
        }
    }
}

/// Regular tiled pyramid
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidSource {
    pub geometry: PyramidGeometry,
    tiles_url: String,
    format: String,
    /// Display rectangles grouped by every level they apply to
    level_rects: BTreeMap<i32, Vec<DisplayRect>>,
}

impl PyramidSource {
    pub fn new(config: PyramidConfig) -> Result<Self, SourceError> {
        let geometry = PyramidGeometry::new(
            config.width,
            config.height,
            config.tile_size,
            config.tile_overlap,
            config.min_level,
            config.max_level,
        )?;

        let mut level_rects: BTreeMap<i32, Vec<DisplayRect>> = BTreeMap::new();
        for rect in &config.display_rects {
            for level in rect.min_level..=rect.max_level {
                level_rects.entry(level).or_default().push(*rect);
            }
        }

        Ok(Self {
            geometry,
            tiles_url: config.tiles_url,
            format: config.format,
            level_rects,
        })
    }

    pub fn level_scale(&self, level: i32) -> f64 {
        2f64.powi(level - self.geometry.max_level)
    }

    pub fn num_tiles(&self, level: i32) -> I64Vec2 {
        let scaled = self.geometry.dimensions * self.level_scale(level) / self.geometry.tile_size as f64;
        I64Vec2::new(scaled.x.ceil() as i64, scaled.y.ceil() as i64)
    }

    pub fn tile_at_point(&self, level: i32, point: Point) -> I64Vec2 {
        let pixel = point * self.geometry.dimensions.x * self.level_scale(level);
        let tile_size = self.geometry.tile_size as f64;
        I64Vec2::new((pixel.x / tile_size).floor() as i64, (pixel.y / tile_size).floor() as i64)
    }

    pub fn tile_bounds(&self, level: i32, x: i64, y: i64) -> Rect {
        let scaled = self.geometry.dimensions * self.level_scale(level);
        let tile_size = self.geometry.tile_size as f64;
        let overlap = self.geometry.tile_overlap as f64;

        let px = if x == 0 { 0.0 } else { tile_size * x as f64 - overlap };
        let py = if y == 0 { 0.0 } else { tile_size * y as f64 - overlap };
        let sx = (tile_size + if x == 0 { 1.0 } else { 2.0 } * overlap).min(scaled.x - px);
        let sy = (tile_size + if y == 0 { 1.0 } else { 2.0 } * overlap).min(scaled.y - py);

        let scale = 1.0 / scaled.x;
        Rect::new(px * scale, py * scale, sx * scale, sy * scale)
    }

    pub fn tile_url(&self, level: i32, x: i64, y: i64) -> String {
        format!("{}{}/{}_{}.{}", self.tiles_url, level, x, y, self.format)
    }

    pub fn tile_exists(&self, level: i32, x: i64, y: i64) -> bool {
        in_level_bounds(&self.geometry, self.num_tiles(level), level, x, y)
            && self.in_display_rects(level, x, y)
    }

    /// Levels without display rectangles are unrestricted
    fn in_display_rects(&self, level: i32, x: i64, y: i64) -> bool {
        let Some(rects) = self.level_rects.get(&level).filter(|r| !r.is_empty()) else {
            return true;
        };

        let scale = self.level_scale(level);
        let tile_size = self.geometry.tile_size as f64;
        rects.iter().any(|rect| {
            let x_min = (rect.x * scale / tile_size).floor() as i64;
            let y_min = (rect.y * scale / tile_size).floor() as i64;
            let x_max = ((rect.x + rect.width) * scale / tile_size).ceil() as i64;
            let y_max = ((rect.y + rect.height) * scale / tile_size).ceil() as i64;
            x_min <= x && x < x_max && y_min <= y && y < y_max
        })
    }
}
