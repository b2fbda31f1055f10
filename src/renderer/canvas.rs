//! CPU compositor for drawer frames
//!
//! `RasterCanvas` paints tiles back to front with per-tile opacity into an
//! `RgbaImage`, the headless counterpart of a browser canvas.

use super::Frame;
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Anything that can show a drawer frame
pub trait RenderSurface {
    /// Replace the surface contents with `frame`
    fn present(&mut self, frame: &Frame);
}

pub struct RasterCanvas {
    image: RgbaImage,
    background: Rgba<u8>,
    /// Outline colour for scaling overlays; `None` skips them
    overlay_outline: Option<Rgba<u8>>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let background = Rgba([0, 0, 0, 255]);
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), background),
            background,
            overlay_outline: Some(Rgba([255, 64, 64, 255])),
        }
    }

    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self
    }

    pub fn with_overlay_outline(mut self, outline: Option<Rgba<u8>>) -> Self {
        self.overlay_outline = outline;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.image
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Frame saved: {}", path.display());
        Ok(())
    }

    fn clear(&mut self, width: u32, height: u32) {
        if self.image.width() != width || self.image.height() != height {
            self.image = RgbaImage::new(width, height);
        }
        for pixel in self.image.pixels_mut() {
            *pixel = self.background;
        }
    }

    /// Source-over blend of `tile` scaled to `size` at `(left, top)`.
    /// Only the on-canvas part is sampled, nearest neighbour per pixel.
    fn blend(&mut self, tile: &RgbaImage, left: i64, top: i64, width: u32, height: u32, opacity: f64) {
        if width == 0 || height == 0 || opacity <= 0.0 || tile.width() == 0 || tile.height() == 0 {
            return;
        }

        let (canvas_w, canvas_h) = (self.image.width() as i64, self.image.height() as i64);
        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = (left + width as i64).min(canvas_w);
        let y1 = (top + height as i64).min(canvas_h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let scale_x = tile.width() as f64 / width as f64;
        let scale_y = tile.height() as f64 / height as f64;
        let alpha_scale = opacity.min(1.0) / 255.0;

        for y in y0..y1 {
            let sy = (((y - top) as f64 * scale_y) as u32).min(tile.height() - 1);
            for x in x0..x1 {
                let sx = (((x - left) as f64 * scale_x) as u32).min(tile.width() - 1);
                let s = tile.get_pixel(sx, sy);
                let alpha = s[3] as f64 * alpha_scale;
                let d = self.image.get_pixel_mut(x as u32, y as u32);
                for c in 0..3 {
                    d[c] = (s[c] as f64 * alpha + d[c] as f64 * (1.0 - alpha)).round() as u8;
                }
                d[3] = (255.0 * alpha + d[3] as f64 * (1.0 - alpha)).round() as u8;
            }
        }
    }

    fn outline(&mut self, left: i64, top: i64, width: i64, height: i64, colour: Rgba<u8>) {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let mut put = |x: i64, y: i64| {
            if (0..w).contains(&x) && (0..h).contains(&y) {
                self.image.put_pixel(x as u32, y as u32, colour);
            }
        };
        let (right, bottom) = (left + width - 1, top + height - 1);
        for x in left..=right {
            put(x, top);
            put(x, bottom);
        }
        for y in top..=bottom {
            put(left, y);
            put(right, y);
        }
    }
}

impl RenderSurface for RasterCanvas {
    fn present(&mut self, frame: &Frame) {
        let width = frame.container_size.x.max(1.0) as u32;
        let height = frame.container_size.y.max(1.0) as u32;
        self.clear(width, height);

        for draw in &frame.tiles {
            let position = draw.position.floor();
            let size = draw.size.ceil();
            self.blend(
                draw.bitmap.image(),
                position.x as i64,
                position.y as i64,
                size.x.max(0.0) as u32,
                size.y.max(0.0) as u32,
                draw.opacity,
            );
        }

        if let Some(colour) = self.overlay_outline {
            for overlay in frame.overlays.iter().filter(|o| o.scales) {
                self.outline(
                    overlay.position.x as i64,
                    overlay.position.y as i64,
                    overlay.size.x as i64,
                    overlay.size.y as i64,
                    colour,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::renderer::TileDraw;
    use crate::tile::{Bitmap, TileKey};

    fn frame(draws: Vec<TileDraw>) -> Frame {
        Frame {
            container_size: Point::new(8.0, 8.0),
            tiles: draws,
            overlays: Vec::new(),
        }
    }

    fn draw(rgba: [u8; 4], position: Point, size: Point, opacity: f64) -> TileDraw {
        TileDraw {
            key: TileKey::new(0, 0, 0),
            bitmap: Bitmap::filled(2, 2, rgba),
            position,
            size,
            opacity,
        }
    }

    #[test]
    fn test_back_to_front_with_opacity() {
        let mut canvas = RasterCanvas::new(8, 8);
        canvas.present(&frame(vec![
            draw([255, 0, 0, 255], Point::ZERO, Point::new(8.0, 8.0), 1.0),
            draw([0, 0, 255, 255], Point::new(4.0, 4.0), Point::new(4.0, 4.0), 0.5),
        ]));

        assert_eq!(*canvas.image().get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        let mixed = canvas.image().get_pixel(6, 6);
        assert!(mixed[0] > 100 && mixed[0] < 150);
        assert!(mixed[2] > 100 && mixed[2] < 150);
    }

    #[test]
    fn test_offscreen_tiles_are_clipped() {
        let mut canvas = RasterCanvas::new(8, 8).with_background(Rgba([1, 2, 3, 255]));
        canvas.present(&frame(vec![draw([9, 9, 9, 255], Point::new(-2.0, 6.0), Point::new(4.0, 4.0), 1.0)]));
        assert_eq!(*canvas.image().get_pixel(7, 0), Rgba([1, 2, 3, 255]));
        assert_eq!(*canvas.image().get_pixel(0, 7), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_huge_tile_samples_only_visible_part() {
        let mut canvas = RasterCanvas::new(8, 8).with_background(Rgba([1, 2, 3, 255]));
        canvas.present(&frame(vec![draw(
            [9, 9, 9, 255],
            Point::new(-6000.0, -6000.0),
            Point::new(12000.0, 12000.0),
            1.0,
        )]));
        assert!(canvas.image().pixels().all(|p| *p == Rgba([9, 9, 9, 255])));

        // entirely off the canvas
        canvas.present(&frame(vec![draw(
            [9, 9, 9, 255],
            Point::new(-200000.0, 50.0),
            Point::new(100000.0, 100000.0),
            1.0,
        )]));
        assert!(canvas.image().pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn test_scaled_tile_keeps_pixel_layout() {
        let mut bitmap = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        bitmap.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let mut canvas = RasterCanvas::new(8, 8);
        canvas.blend(&bitmap, 0, 0, 8, 8, 1.0);
        assert_eq!(*canvas.image().get_pixel(2, 2), Rgba([0, 0, 0, 255]));
        assert_eq!(*canvas.image().get_pixel(6, 6), Rgba([255, 255, 255, 255]));
        assert_eq!(*canvas.image().get_pixel(3, 4), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_resizes_to_container() {
        let mut canvas = RasterCanvas::new(2, 2);
        canvas.present(&Frame {
            container_size: Point::new(16.0, 4.0),
            tiles: Vec::new(),
            overlays: Vec::new(),
        });
        assert_eq!((canvas.width(), canvas.height()), (16, 4));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RasterCanvas::new(3, 3).save(&path).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 3);
    }
}
