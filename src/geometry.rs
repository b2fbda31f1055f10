//! Geometry primitives
//!
//! Points are plain `glam::DVec2` values. Rectangles live in normalized
//! image space, where a width of 1.0 spans the full base-resolution image.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D point or vector (image space, viewport space or screen pixels)
pub type Point = DVec2;

/// Helpers `DVec2` lacks
pub trait PointExt {
    /// Apply `f` to both components
    fn apply(self, f: impl Fn(f64) -> f64) -> Self;
}

impl PointExt for Point {
    fn apply(self, f: impl Fn(f64) -> f64) -> Self {
        Point::new(f(self.x), f(self.y))
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_corners(top_left: Point, bottom_right: Point) -> Self {
        let size = bottom_right - top_left;
        Self::new(top_left.x, top_left.y, size.x, size.y)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Point {
        Point::new(self.width, self.height)
    }

    /// Same rectangle moved by `delta`
    pub fn translate(&self, delta: Point) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}x{}]", self.x, self.y, self.width, self.height)
    }
}
