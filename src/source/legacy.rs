//! Legacy pyramid: one arbitrary-size image per level

use super::{in_level_bounds, PyramidGeometry, SourceError};
use crate::geometry::Rect;
use glam::I64Vec2;
use serde::{Deserialize, Serialize};

/// A single level image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyLevel {
    pub url: String,
    pub width: f64,
    pub height: f64,
}

/// Levels ordered from smallest to full resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyConfig {
    pub levels: Vec<LegacyLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacySource {
    pub geometry: PyramidGeometry,
    levels: Vec<LegacyLevel>,
}

impl LegacySource {
    pub fn new(config: LegacyConfig) -> Result<Self, SourceError> {
        let last = config.levels.last().ok_or(SourceError::NoLevels)?;
        let geometry = PyramidGeometry::new(
            last.width,
            last.height,
            last.width.max(last.height).ceil() as u32,
            0,
            Some(0),
            Some(config.levels.len() as i32 - 1),
        )?;
        Ok(Self {
            geometry,
            levels: config.levels,
        })
    }

    fn level(&self, level: i32) -> Option<&LegacyLevel> {
        if self.geometry.contains_level(level) {
            self.levels.get(level as usize)
        } else {
            None
        }
    }

    /// Zero outside the configured levels
    pub fn level_scale(&self, level: i32) -> f64 {
        match self.level(level) {
            Some(l) => l.height / self.geometry.dimensions.y,
            None => 0.0,
        }
    }

    pub fn num_tiles(&self, level: i32) -> I64Vec2 {
        if self.level_scale(level) > 0.0 {
            I64Vec2::ONE
        } else {
            I64Vec2::ZERO
        }
    }

    pub fn tile_bounds(&self, level: i32, x: i64, y: i64) -> Rect {
        let Some(file) = self.level(level) else {
            return Rect::default();
        };
        let scaled = self.geometry.dimensions * self.level_scale(level);
        let px = if x == 0 { 0.0 } else { file.width };
        let py = if y == 0 { 0.0 } else { file.height };
        let sx = file.width.min(scaled.x - px);
        let sy = file.height.min(scaled.y - py);
        // width-normalized, like every other tile rect
        let scale = 1.0 / scaled.x;
        Rect::new(px * scale, py * scale, sx * scale, sy * scale)
    }

    pub fn tile_url(&self, level: i32) -> Option<String> {
        self.level(level).map(|l| l.url.clone())
    }

    pub fn tile_exists(&self, level: i32, x: i64, y: i64) -> bool {
        in_level_bounds(&self.geometry, self.num_tiles(level), level, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> LegacySource {
        LegacySource::new(LegacyConfig {
            levels: vec![
                LegacyLevel { url: "small.jpg".into(), width: 250.0, height: 200.0 },
                LegacyLevel { url: "medium.jpg".into(), width: 500.0, height: 400.0 },
                LegacyLevel { url: "large.jpg".into(), width: 1000.0, height: 800.0 },
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_levels_are_single_tiles() {
        let s = source();
        assert_eq!(s.geometry.max_level, 2);
        assert_eq!(s.geometry.tile_size, 1000);
        assert_eq!(s.num_tiles(1), I64Vec2::ONE);
        assert_eq!(s.num_tiles(3), I64Vec2::ZERO);
        assert!(s.tile_exists(0, 0, 0));
        assert!(!s.tile_exists(0, 1, 0));
        assert!(!s.tile_exists(3, 0, 0));
    }

    #[test]
    fn test_whole_level_urls_and_scale() {
        let s = source();
        assert_eq!(s.tile_url(1).as_deref(), Some("medium.jpg"));
        assert_eq!(s.tile_url(5), None);
        assert_eq!(s.level_scale(2), 1.0);
        assert_eq!(s.level_scale(1), 0.5);
    }

    #[test]
    fn test_bounds_cover_image() {
        let s = source();
        let b = s.tile_bounds(1, 0, 0);
        assert_eq!(b.x, 0.0);
        assert!((b.width - 1.0).abs() < 1e-12);
        assert!((b.height - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_empty_levels_rejected() {
        assert!(matches!(LegacySource::new(LegacyConfig { levels: vec![] }), Err(SourceError::NoLevels)));
    }
}
