//! Per-frame coverage bookkeeping
//!
//! `coverage[level][(x, y)]` records whether a tile visited this frame is
//! fully opaque on screen. Coarser levels consult the next finer level to
//! decide whether they still need to draw underneath it.
//!
//! Tiles out of bounds provide coverage (there is nothing under them to
//! hide), but tiles on a level that was never visited do not.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct CoverageMap {
    levels: HashMap<i32, HashMap<(i64, i64), bool>>,
}

impl CoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every level
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Start a level afresh; must precede `set` on that level
    pub fn reset_level(&mut self, level: i32) {
        self.levels.insert(level, HashMap::new());
    }

    pub fn set(&mut self, level: i32, x: i64, y: i64, covers: bool) {
        match self.levels.get_mut(&level) {
            Some(cells) => {
                cells.insert((x, y), covers);
            }
            None => tracing::warn!("Setting coverage for level {} before it was reset", level),
        }
    }

    /// True when tile `(x, y)` hides whatever lies beneath it
    pub fn provides_coverage(&self, level: i32, x: i64, y: i64) -> bool {
        match self.levels.get(&level) {
            Some(cells) => cells.get(&(x, y)).copied().unwrap_or(true),
            None => false,
        }
    }

    /// True when every visited tile of `level` provides coverage
    pub fn level_provides_coverage(&self, level: i32) -> bool {
        match self.levels.get(&level) {
            Some(cells) => cells.values().all(|&covers| covers),
            None => false,
        }
    }

    /// True when the four children of `(x, y)` on the next level all cover
    pub fn is_covered(&self, level: i32, x: i64, y: i64) -> bool {
        let (cx, cy) = (2 * x, 2 * y);
        self.provides_coverage(level + 1, cx, cy)
            && self.provides_coverage(level + 1, cx, cy + 1)
            && self.provides_coverage(level + 1, cx + 1, cy)
            && self.provides_coverage(level + 1, cx + 1, cy + 1)
    }
}
