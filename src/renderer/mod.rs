//! Tile scheduler and frame builder
//!
//! Every tick the drawer picks the pyramid levels worth showing for the
//! current viewport, walks their visible tiles, and emits a back-to-front
//! `Frame`. Coarser levels fill in wherever finer tiles are missing or
//! still fading in, so the view is never blank while tiles stream.
//!
//! - At most one new tile load is issued per tick (the best candidate)
//! - Loaded bitmaps are bounded by a `TileCache`
//! - Completions from before the last reset are ignored

mod cache;
mod canvas;
mod coverage;

pub use cache::*;
pub use canvas::*;
pub use coverage::*;

use crate::config::ViewerConfig;
use crate::geometry::Point;
use crate::loader::{ImageCompletion, ImageJob, ImageLoader};
use crate::overlay::{ElementId, Overlay, OverlayDraw, OverlayLocation, Placement};
use crate::source::TileSource;
use crate::tile::{Bitmap, Tile, TileKey};
use crate::viewport::Viewport;
use glam::I64Vec2;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Epochs are unique across every drawer in the process
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// One tile to paint
#[derive(Debug, Clone)]
pub struct TileDraw {
    pub key: TileKey,
    pub bitmap: Bitmap,
    /// Top-left corner in container pixels
    pub position: Point,
    pub size: Point,
    pub opacity: f64,
}

/// Output of one drawer pass
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub container_size: Point,
    /// Back to front
    pub tiles: Vec<TileDraw>,
    pub overlays: Vec<OverlayDraw>,
}

impl Frame {
    fn new(container_size: Point) -> Self {
        Self {
            container_size,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty() && self.overlays.is_empty()
    }
}

/// Load candidate retained across the tile walk
#[derive(Debug, Clone, Copy)]
struct Candidate {
    key: TileKey,
    visibility: f64,
    distance: f64,
}

/// Higher visibility wins, then the tile nearer the viewport center
fn best_candidate(best: Option<Candidate>, tile: &Tile) -> Option<Candidate> {
    let candidate = Candidate {
        key: tile.key,
        visibility: tile.visibility,
        distance: tile.distance,
    };
    match best {
        Some(prev)
            if candidate.visibility < prev.visibility
                || (candidate.visibility == prev.visibility && candidate.distance >= prev.distance) =>
        {
            Some(prev)
        }
        _ => Some(candidate),
    }
}

pub struct Drawer {
    source: TileSource,
    config: ViewerConfig,
    /// Image height over width
    norm_height: f64,
    tiles: HashMap<TileKey, Tile>,
    cache: TileCache,
    coverage: CoverageMap,
    overlays: Vec<Overlay>,
    /// Tiles emitted last frame, front to back
    last_drawn: Vec<TileKey>,
    last_reset_time: f64,
    epoch: u64,
    mid_update: bool,
    update_again: bool,
}

impl Drawer {
    pub fn new(source: TileSource, config: &ViewerConfig, now: f64) -> Self {
        let dimensions = source.dimensions();
        Self {
            norm_height: dimensions.y / dimensions.x,
            cache: TileCache::new(config.max_image_cache_count),
            source,
            config: config.clone(),
            tiles: HashMap::new(),
            coverage: CoverageMap::new(),
            overlays: Vec::new(),
            last_drawn: Vec::new(),
            last_reset_time: now,
            epoch: next_epoch(),
            mid_update: false,
            update_again: true,
        }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn tile(&self, key: TileKey) -> Option<&Tile> {
        self.tiles.get(&key)
    }

    pub fn needs_update(&self) -> bool {
        self.update_again
    }

    pub fn num_tiles_loaded(&self) -> usize {
        self.cache.len()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_reset_time(&self) -> f64 {
        self.last_reset_time
    }

    /// Drop every tile; loads still in flight become stale
    pub fn reset(&mut self, now: f64) {
        tracing::info!("Drawer reset: dropping {} tiles", self.tiles.len());
        self.tiles.clear();
        self.cache.clear();
        self.last_drawn.clear();
        self.coverage.clear();
        self.last_reset_time = now;
        self.epoch = next_epoch();
        self.update_again = true;
    }

    /// Build the next frame, issuing at most one tile load
    pub fn update(&mut self, viewport: &Viewport, loader: &mut ImageLoader, now: f64) -> Frame {
        self.mid_update = true;
        let frame = self.update_actual(viewport, loader, now);
        self.mid_update = false;
        frame
    }

    fn update_actual(&mut self, viewport: &Viewport, loader: &mut ImageLoader, now: f64) -> Frame {
        self.update_again = false;

        let mut frame = Frame::new(viewport.container_size());
        for key in self.last_drawn.drain(..) {
            if let Some(tile) = self.tiles.get_mut(&key) {
                tile.being_drawn = false;
            }
        }
        self.coverage.clear();

        let wrap_h = self.config.wrap_horizontal;
        let wrap_v = self.config.wrap_vertical;

        let bounds = viewport.bounds(true);
        let mut viewport_tl = bounds.top_left();
        let mut viewport_br = bounds.bottom_right();

        if !wrap_h && (viewport_br.x < 0.0 || viewport_tl.x > 1.0) {
            return frame;
        }
        if !wrap_v && (viewport_br.y < 0.0 || viewport_tl.y > self.norm_height) {
            return frame;
        }

        if !wrap_h {
            viewport_tl.x = viewport_tl.x.max(0.0);
            viewport_br.x = viewport_br.x.min(1.0);
        }
        if !wrap_v {
            viewport_tl.y = viewport_tl.y.max(0.0);
            viewport_br.y = viewport_br.y.min(self.norm_height);
        }

        let viewport_center = viewport.pixel_from_point(viewport.center(false), false);
        let zero_ratio_t = render_ratio(viewport, &self.source, 0, false);
        let zero_ratio_c = render_ratio(viewport, &self.source, 0, true);
        let optimal_ratio = if self.config.immediate_render { 1.0 } else { zero_ratio_t };

        let highest = self
            .source
            .max_level()
            .min((zero_ratio_c / self.config.min_pixel_ratio).log2().floor() as i32);
        let lowest = self
            .source
            .min_level()
            .max(self.config.min_zoom_image_ratio.log2().floor() as i32)
            .min(highest);

        let mut have_drawn = false;
        let mut best: Option<Candidate> = None;

        for level in (lowest..=highest).rev() {
            let ratio_c = render_ratio(viewport, &self.source, level, true);
            let ratio_t = render_ratio(viewport, &self.source, level, false);

            let mut draw_level = false;
            if (!have_drawn && ratio_c >= self.config.min_pixel_ratio) || level == lowest {
                draw_level = true;
                have_drawn = true;
            } else if !have_drawn {
                continue;
            }

            self.coverage.reset_level(level);

            let level_opacity = ((ratio_c - 0.5) / 0.5).min(1.0);
            let level_visibility = optimal_ratio / (optimal_ratio - ratio_t).abs();

            let tile_tl = self.source.tile_at_point(level, viewport_tl);
            let mut tile_br = self.source.tile_at_point(level, viewport_br);
            let num_tiles = self.source.num_tiles(level);

            if !wrap_h {
                tile_br.x = tile_br.x.min(num_tiles.x - 1);
            }
            if !wrap_v {
                tile_br.y = tile_br.y.min(num_tiles.y - 1);
            }
            if num_tiles.x <= 0 || num_tiles.y <= 0 {
                tile_br = tile_tl - I64Vec2::ONE;
            }

            for x in tile_tl.x..=tile_br.x {
                for y in tile_tl.y..=tile_br.y {
                    let key = TileKey::new(level, x, y);
                    let exists = self.touch_tile(key, num_tiles, now).exists;

                    self.coverage.set(level, x, y, false);
                    if !exists {
                        continue;
                    }

                    let mut draw_tile = draw_level;
                    if have_drawn && !draw_tile {
                        if self.coverage.is_covered(level, x, y) {
                            self.coverage.set(level, x, y, true);
                        } else {
                            draw_tile = true;
                        }
                    }
                    if !draw_tile {
                        continue;
                    }

                    let overlap = self.source.tile_overlap() > 0;
                    let Some(tile) = self.tiles.get_mut(&key) else {
                        continue;
                    };
                    position_tile(tile, viewport, viewport_center, level_visibility, overlap);

                    if tile.loaded {
                        if self.blend_tile(key, level_opacity, now) {
                            self.update_again = true;
                        }
                    } else if !tile.loading {
                        best = best_candidate(best, tile);
                    }
                }
            }

            if self.coverage.level_provides_coverage(level) {
                break;
            }
        }

        self.draw_tiles(&mut frame);
        frame.overlays = self.overlays.iter().map(|o| o.position(viewport)).collect();

        if let Some(candidate) = best {
            if self.cache.has_room(&self.tiles) {
                self.load_tile(candidate.key, loader, now);
                self.update_again = true;
            } else {
                // every cached tile is on screen, a new bitmap would be dropped
                tracing::debug!("Tile cache saturated, not loading {}", candidate.key);
            }
        }

        frame
    }

    /// Get or lazily create a tile; wrapped coordinates reuse the source
    /// tile of the folded position with shifted bounds
    fn touch_tile(&mut self, key: TileKey, num_tiles: I64Vec2, now: f64) -> &mut Tile {
        let source = &self.source;
        let norm_height = self.norm_height;

        let tile = self.tiles.entry(key).or_insert_with(|| {
            let x_mod = key.x.rem_euclid(num_tiles.x);
            let y_mod = key.y.rem_euclid(num_tiles.y);
            let exists = source.tile_exists(key.level, x_mod, y_mod);
            let url = source.tile_url(key.level, x_mod, y_mod);
            let bounds = source.tile_bounds(key.level, x_mod, y_mod).translate(Point::new(
                (key.x - x_mod) as f64 / num_tiles.x as f64,
                norm_height * (key.y - y_mod) as f64 / num_tiles.y as f64,
            ));

            Tile::new(key, bounds, exists, url)
        });
        tile.last_touch_time = now;
        tile
    }

    /// Fade a loaded tile in. Returns true while the fade is still running.
    fn blend_tile(&mut self, key: TileKey, level_opacity: f64, now: f64) -> bool {
        let blend_ms = 1000.0 * self.config.blend_time;
        let Some(tile) = self.tiles.get_mut(&key) else {
            return false;
        };

        let blend_start = *tile.blend_start.get_or_insert(now);
        let delta = now - blend_start;
        let mut opacity = if blend_ms > 0.0 { (delta / blend_ms).min(1.0) } else { 1.0 };
        if self.config.always_blend {
            opacity *= level_opacity;
        }
        tile.opacity = opacity;

        self.last_drawn.push(key);

        if opacity == 1.0 {
            self.coverage.set(key.level, key.x, key.y, true);
            false
        } else {
            delta < blend_ms
        }
    }

    fn draw_tiles(&mut self, frame: &mut Frame) {
        for key in self.last_drawn.iter().rev() {
            let Some(tile) = self.tiles.get_mut(key) else {
                continue;
            };
            let Some(bitmap) = tile.image.clone() else {
                tracing::warn!("Attempting to draw tile {} when it's not yet loaded", key);
                continue;
            };
            frame.tiles.push(TileDraw {
                key: *key,
                bitmap,
                position: tile.position,
                size: tile.size,
                opacity: tile.opacity,
            });
            tile.being_drawn = true;
        }
    }

    fn load_tile(&mut self, key: TileKey, loader: &mut ImageLoader, now: f64) {
        let epoch = self.epoch;
        let Some(tile) = self.tiles.get_mut(&key) else {
            return;
        };
        let Some(url) = tile.url.clone() else {
            tracing::debug!("Tile {} has no url", key);
            tile.exists = false;
            return;
        };
        tile.loading = loader.load_image(ImageJob {
            key,
            url,
            issued_at: now,
            epoch,
        });
    }

    /// Apply a finished load
    pub fn on_tile_load(&mut self, completion: ImageCompletion) {
        let key = completion.key;

        if completion.epoch != self.epoch {
            tracing::debug!("Ignoring tile {} loaded before reset: {}", key, completion.url);
            return;
        }
        let Some(tile) = self.tiles.get_mut(&key) else {
            tracing::debug!("Ignoring load for unknown tile {}", key);
            return;
        };

        tile.loading = false;

        if self.mid_update {
            tracing::warn!("Tile load callback in middle of drawing routine: {}", key);
            return;
        }
        let Some(bitmap) = completion.bitmap else {
            tracing::debug!("Tile {} failed to load: {}", key, completion.url);
            tile.exists = false;
            return;
        };

        tile.loaded = true;
        tile.image = Some(bitmap);

        let cutoff = (self.source.tile_size() as f64).log2().ceil() as i32;
        match self.cache.insert(key, &self.tiles, cutoff) {
            CacheInsert::Added | CacheInsert::Present => {}
            CacheInsert::Replaced(victim) => {
                if let Some(evicted) = self.tiles.get_mut(&victim) {
                    tracing::debug!("Evicting tile {}", victim);
                    evicted.unload();
                }
            }
            CacheInsert::Full => {
                tracing::warn!("Tile cache full of drawn tiles, dropping {}", key);
                if let Some(tile) = self.tiles.get_mut(&key) {
                    tile.unload();
                }
            }
        }
        self.update_again = true;
    }

    pub fn add_overlay(&mut self, element: ElementId, location: OverlayLocation, placement: Placement, size: Point) {
        if self.overlay_index(element).is_some() {
            // duplicate
            return;
        }
        self.overlays.push(Overlay::new(element, location, placement, size));
        self.update_again = true;
    }

    pub fn update_overlay(&mut self, element: ElementId, location: OverlayLocation, placement: Placement) {
        if let Some(i) = self.overlay_index(element) {
            self.overlays[i].update(location, placement);
            self.update_again = true;
        }
    }

    /// Report a new measured element size for a point overlay
    pub fn resize_overlay(&mut self, element: ElementId, size: Point) {
        if let Some(i) = self.overlay_index(element) {
            self.overlays[i].set_element_size(size);
            self.update_again = true;
        }
    }

    pub fn remove_overlay(&mut self, element: ElementId) {
        if let Some(i) = self.overlay_index(element) {
            self.overlays.remove(i);
            self.update_again = true;
        }
    }

    pub fn clear_overlays(&mut self) {
        if !self.overlays.is_empty() {
            self.overlays.clear();
            self.update_again = true;
        }
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    fn overlay_index(&self, element: ElementId) -> Option<usize> {
        self.overlays.iter().rposition(|o| o.element == element)
    }

    /// Deliver a completion as if it raced the drawing routine
    #[cfg(test)]
    fn on_tile_load_mid_update(&mut self, completion: ImageCompletion) {
        self.mid_update = true;
        self.on_tile_load(completion);
        self.mid_update = false;
    }
}

/// Screen pixels per level pixel, horizontally
fn render_ratio(viewport: &Viewport, source: &TileSource, level: i32, current: bool) -> f64 {
    viewport.delta_pixels_from_points(source.pixel_ratio(level), current).x
}

/// Screen placement and load priority of a tile about to be drawn
fn position_tile(tile: &mut Tile, viewport: &Viewport, viewport_center: Point, visibility: f64, overlap: bool) {
    let bounds_tl = tile.bounds.top_left();
    let bounds_size = tile.bounds.size();

    let position_c = viewport.pixel_from_point(bounds_tl, true);
    let mut size_c = viewport.delta_pixels_from_points(bounds_size, true);
    let position_t = viewport.pixel_from_point(bounds_tl, false);
    let size_t = viewport.delta_pixels_from_points(bounds_size, false);
    let tile_center = position_t + size_t / 2.0;

    // hide seams between tiles that don't overlap
    if !overlap {
        size_c += Point::ONE;
    }

    tile.position = position_c;
    tile.size = size_c;
    tile.distance = viewport_center.distance(tile_center);
    tile.visibility = visibility;
}
