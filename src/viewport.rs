//! Spring-animated viewport
//!
//! Maps between three spaces:
//! - image space: normalized, the image spans x in [0, 1] and y in [0, h/w]
//! - viewport bounds: the part of image space currently visible
//! - screen pixels inside the container
//!
//! Center x, center y and zoom are each driven by a `Spring`, so every
//! accessor comes in a `current` flavour (mid-animation) and a target
//! flavour (where the animation ends).

use crate::config::ViewerConfig;
use crate::geometry::{Point, Rect};
use crate::spring::Spring;

/// Pan/zoom constraints and animation feel
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSettings {
    pub spring_stiffness: f64,
    pub animation_time: f64,
    pub min_zoom_image_ratio: f64,
    pub max_zoom_pixel_ratio: f64,
    pub visibility_ratio: f64,
    pub wrap_horizontal: bool,
    pub wrap_vertical: bool,
}

impl From<&ViewerConfig> for ViewportSettings {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            spring_stiffness: config.spring_stiffness,
            animation_time: config.animation_time,
            min_zoom_image_ratio: config.min_zoom_image_ratio,
            max_zoom_pixel_ratio: config.max_zoom_pixel_ratio,
            visibility_ratio: config.visibility_ratio,
            wrap_horizontal: config.wrap_horizontal,
            wrap_vertical: config.wrap_vertical,
        }
    }
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    container_size: Point,
    content_size: Point,
    content_aspect_x: f64,
    content_aspect_y: f64,
    fit_width_bounds: Rect,
    fit_height_bounds: Rect,
    home_bounds: Rect,
    center_spring_x: Spring,
    center_spring_y: Spring,
    zoom_spring: Spring,
    /// Image point held still on screen while the zoom spring moves
    zoom_point: Option<Point>,
    settings: ViewportSettings,
}

impl Viewport {
    /// Create a viewport showing the home view at time `now` (ms)
    pub fn new(container_size: Point, content_size: Point, settings: ViewportSettings, now: f64) -> Self {
        let spring = |initial| Spring::new(initial, settings.spring_stiffness, settings.animation_time);
        let mut viewport = Self {
            container_size,
            content_size,
            content_aspect_x: 1.0,
            content_aspect_y: 1.0,
            fit_width_bounds: Rect::default(),
            fit_height_bounds: Rect::default(),
            home_bounds: Rect::default(),
            center_spring_x: spring(0.0),
            center_spring_y: spring(0.0),
            zoom_spring: spring(1.0),
            zoom_point: None,
            settings,
        };
        viewport.center_spring_x.update(now);
        viewport.center_spring_y.update(now);
        viewport.zoom_spring.update(now);

        viewport.reset_content_size(content_size);
        viewport.go_home(true);
        viewport.update(now);
        viewport
    }

    pub fn reset_content_size(&mut self, content_size: Point) -> &mut Self {
        self.content_size = content_size;
        self.content_aspect_x = content_size.x / content_size.y;
        self.content_aspect_y = content_size.y / content_size.x;
        self.fit_width_bounds = Rect::new(0.0, 0.0, 1.0, self.content_aspect_y);
        self.fit_height_bounds = Rect::new(0.0, 0.0, self.content_aspect_y, self.content_aspect_y);
        self.home_bounds = Rect::new(0.0, 0.0, 1.0, self.content_aspect_y);
        self
    }

    pub fn settings(&self) -> &ViewportSettings {
        &self.settings
    }

    pub fn home_bounds(&self) -> Rect {
        self.home_bounds
    }

    pub fn content_size(&self) -> Point {
        self.content_size
    }

    pub fn container_size(&self) -> Point {
        self.container_size
    }

    /// Container width over height
    pub fn aspect_ratio(&self) -> f64 {
        self.container_size.x / self.container_size.y
    }

    pub fn home_zoom(&self) -> f64 {
        let aspect_factor = self.content_aspect_x / self.aspect_ratio();
        if aspect_factor >= 1.0 {
            1.0
        } else {
            aspect_factor
        }
    }

    pub fn min_zoom(&self) -> f64 {
        let home = self.home_zoom();
        (self.settings.min_zoom_image_ratio * home).min(home)
    }

    pub fn max_zoom(&self) -> f64 {
        let zoom = self.content_size.x * self.settings.max_zoom_pixel_ratio / self.container_size.x;
        zoom.max(self.home_zoom())
    }

    /// Visible region of image space
    pub fn bounds(&self, current: bool) -> Rect {
        let center = self.center(current);
        let width = 1.0 / self.zoom(current);
        let height = width / self.aspect_ratio();
        Rect::new(center.x - width / 2.0, center.y - height / 2.0, width, height)
    }

    /// Center of the view. The target center accounts for the shift the
    /// zoom anchor will still apply before the zoom spring settles.
    pub fn center(&self, current: bool) -> Point {
        let center_current = Point::new(self.center_spring_x.current.value, self.center_spring_y.current.value);
        let center_target = Point::new(self.center_spring_x.target.value, self.center_spring_y.target.value);

        if current {
            return center_current;
        }
        let Some(zoom_point) = self.zoom_point else {
            return center_target;
        };

        let old_zoom_pixel = self.pixel_from_point(zoom_point, true);

        let zoom = self.zoom(false);
        let width = 1.0 / zoom;
        let height = width / self.aspect_ratio();
        let bounds = Rect::new(center_current.x - width / 2.0, center_current.y - height / 2.0, width, height);

        let new_zoom_pixel = (zoom_point - bounds.top_left()) * (self.container_size.x / bounds.width);
        let delta_zoom_pixels = new_zoom_pixel - old_zoom_pixel;
        let delta_zoom_points = delta_zoom_pixels / (self.container_size.x * zoom);

        center_target + delta_zoom_points
    }

    pub fn zoom(&self, current: bool) -> f64 {
        if current {
            self.zoom_spring.current.value
        } else {
            self.zoom_spring.target.value
        }
    }

    /// Clamp zoom and keep enough of the image in view
    pub fn apply_constraints(&mut self, immediately: bool) -> &mut Self {
        let actual_zoom = self.zoom(false);
        let constrained_zoom = actual_zoom.min(self.max_zoom()).max(self.min_zoom());

        if actual_zoom != constrained_zoom {
            self.zoom_to(constrained_zoom, self.zoom_point, immediately);
        }

        let mut bounds = self.bounds(false);
        let horizontal_threshold = self.settings.visibility_ratio * bounds.width;
        let vertical_threshold = self.settings.visibility_ratio * bounds.height;

        // how much of the view overlaps the image past each edge
        let left = bounds.x + bounds.width;
        let right = 1.0 - bounds.x;
        let top = bounds.y + bounds.height;
        let bottom = self.content_aspect_y - bounds.y;

        let mut dx = 0.0;
        if !self.settings.wrap_horizontal {
            if left < horizontal_threshold {
                dx = horizontal_threshold - left;
            } else if right < horizontal_threshold {
                dx = right - horizontal_threshold;
            }
        }

        let mut dy = 0.0;
        if !self.settings.wrap_vertical {
            if top < vertical_threshold {
                dy = vertical_threshold - top;
            } else if bottom < vertical_threshold {
                dy = bottom - vertical_threshold;
            }
        }

        if dx != 0.0 || dy != 0.0 {
            bounds.x += dx;
            bounds.y += dy;
            self.fit_bounds(bounds, immediately);
        }
        self
    }

    /// Same as `apply_constraints`
    pub fn ensure_visible(&mut self, immediately: bool) -> &mut Self {
        self.apply_constraints(immediately)
    }

    /// Animate so that `bounds` fills the container, grown to its aspect ratio
    pub fn fit_bounds(&mut self, bounds: Rect, immediately: bool) -> &mut Self {
        let aspect = self.aspect_ratio();
        let center = bounds.center();
        let mut new_bounds = bounds;

        if new_bounds.aspect_ratio() >= aspect {
            new_bounds.height = bounds.width / aspect;
            new_bounds.y = center.y - new_bounds.height / 2.0;
        } else {
            new_bounds.width = bounds.height * aspect;
            new_bounds.x = center.x - new_bounds.width / 2.0;
        }

        // restart from wherever the animation currently is
        self.pan_to(self.center(true), true);
        self.zoom_to(self.zoom(true), None, true);

        let old_bounds = self.bounds(false);
        let old_zoom = self.zoom(false);
        let new_zoom = 1.0 / new_bounds.width;
        if new_zoom == old_zoom || new_bounds.width == old_bounds.width {
            self.pan_to(center, immediately);
            return self;
        }

        // the image point that sits at the same pixel in both views
        let old_scale = self.container_size.x / old_bounds.width;
        let new_scale = self.container_size.x / new_bounds.width;
        let reference_point =
            (old_bounds.top_left() * old_scale - new_bounds.top_left() * new_scale) / (old_scale - new_scale);

        self.zoom_to(new_zoom, Some(reference_point), immediately);
        self
    }

    /// Fit the home view, folding any wrapped offset back into range first
    pub fn go_home(&mut self, immediately: bool) -> &mut Self {
        self.fold_wrapped_center(1.0, self.content_aspect_y);
        let home = self.home_bounds;
        self.fit_bounds(home, immediately)
    }

    /// Fit the image height, folding any wrapped offset back into range first
    pub fn fit_vertically(&mut self, immediately: bool) -> &mut Self {
        self.fold_wrapped_center(1.0, self.content_aspect_y);
        let bounds = self.fit_height_bounds;
        self.fit_bounds(bounds, immediately)
    }

    /// Fit the image width, folding any wrapped offset back into range first
    pub fn fit_horizontally(&mut self, immediately: bool) -> &mut Self {
        self.fold_wrapped_center(self.content_aspect_x, 1.0);
        let bounds = self.fit_width_bounds;
        self.fit_bounds(bounds, immediately)
    }

    fn fold_wrapped_center(&mut self, period_x: f64, period_y: f64) {
        let center = self.center(false);
        let now = self.center_spring_x.current.time;

        if self.settings.wrap_horizontal {
            self.center_spring_x.reset_to(center.x.rem_euclid(period_x));
            self.center_spring_x.update(now);
        }
        if self.settings.wrap_vertical {
            self.center_spring_y.reset_to(center.y.rem_euclid(period_y));
            self.center_spring_y.update(now);
        }
    }

    pub fn pan_by(&mut self, delta: Point, immediately: bool) -> &mut Self {
        let center = Point::new(self.center_spring_x.target.value, self.center_spring_y.target.value);
        self.pan_to(center + delta, immediately)
    }

    pub fn pan_to(&mut self, center: Point, immediately: bool) -> &mut Self {
        if immediately {
            self.center_spring_x.reset_to(center.x);
            self.center_spring_y.reset_to(center.y);
        } else {
            self.center_spring_x.spring_to(center.x);
            self.center_spring_y.spring_to(center.y);
        }
        self
    }

    pub fn zoom_by(&mut self, factor: f64, ref_point: Option<Point>, immediately: bool) -> &mut Self {
        let zoom = self.zoom_spring.target.value * factor;
        self.zoom_to(zoom, ref_point, immediately)
    }

    /// Zoom keeping `ref_point` (image space) fixed on screen
    pub fn zoom_to(&mut self, zoom: f64, ref_point: Option<Point>, immediately: bool) -> &mut Self {
        if immediately {
            let anchor = ref_point.map(|p| (p, self.pixel_from_point(p, true)));
            self.zoom_spring.reset_to(zoom);
            self.zoom_point = None;

            // the jump happens now, so does the anchor correction
            if let Some((point, old_pixel)) = anchor {
                let delta = self.delta_points_from_pixels(self.pixel_from_point(point, true) - old_pixel, true);
                self.center_spring_x.shift_by(delta.x);
                self.center_spring_x.current.value += delta.x;
                self.center_spring_y.shift_by(delta.y);
                self.center_spring_y.current.value += delta.y;
            }
        } else {
            self.zoom_point = ref_point;
            self.zoom_spring.spring_to(zoom);
        }
        self
    }

    /// Change the container size; with `maintain` the apparent zoom is kept
    pub fn resize(&mut self, new_container_size: Point, maintain: bool) -> &mut Self {
        let mut new_bounds = self.bounds(false);
        let width_delta_factor = new_container_size.x / self.container_size.x;

        self.container_size = new_container_size;

        if maintain {
            new_bounds.width *= width_delta_factor;
            new_bounds.height = new_bounds.width / self.aspect_ratio();
        }

        self.fit_bounds(new_bounds, true)
    }

    /// Advance the springs to `now` (ms). Returns true while anything moved.
    pub fn update(&mut self, now: f64) -> bool {
        let old_center_x = self.center_spring_x.current.value;
        let old_center_y = self.center_spring_y.current.value;
        let old_zoom = self.zoom_spring.current.value;

        let old_zoom_pixel = self.zoom_point.map(|p| self.pixel_from_point(p, true));

        self.zoom_spring.update(now);

        match (self.zoom_point, old_zoom_pixel) {
            (Some(zoom_point), Some(old_zoom_pixel)) if self.zoom_spring.current.value != old_zoom => {
                let new_zoom_pixel = self.pixel_from_point(zoom_point, true);
                let delta_zoom_points = self.delta_points_from_pixels(new_zoom_pixel - old_zoom_pixel, true);
                self.center_spring_x.shift_by(delta_zoom_points.x);
                self.center_spring_y.shift_by(delta_zoom_points.y);
            }
            _ => self.zoom_point = None,
        }

        self.center_spring_x.update(now);
        self.center_spring_y.update(now);

        self.center_spring_x.current.value != old_center_x
            || self.center_spring_y.current.value != old_center_y
            || self.zoom_spring.current.value != old_zoom
    }

    pub fn delta_pixels_from_points(&self, delta_points: Point, current: bool) -> Point {
        delta_points * (self.container_size.x * self.zoom(current))
    }

    pub fn delta_points_from_pixels(&self, delta_pixels: Point, current: bool) -> Point {
        delta_pixels / (self.container_size.x * self.zoom(current))
    }

    pub fn pixel_from_point(&self, point: Point, current: bool) -> Point {
        let bounds = self.bounds(current);
        (point - bounds.top_left()) * (self.container_size.x / bounds.width)
    }

    pub fn point_from_pixel(&self, pixel: Point, current: bool) -> Point {
        let bounds = self.bounds(current);
        pixel / (self.container_size.x / bounds.width) + bounds.top_left()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn square_viewport(settings: ViewportSettings) -> Viewport {
        Viewport::new(Point::new(500.0, 500.0), Point::new(1000.0, 1000.0), settings, 0.0)
    }

    fn assert_rect_eq(a: Rect, b: Rect) {
        assert!((a.x - b.x).abs() < EPS, "{a} vs {b}");
        assert!((a.y - b.y).abs() < EPS, "{a} vs {b}");
        assert!((a.width - b.width).abs() < EPS, "{a} vs {b}");
        assert!((a.height - b.height).abs() < EPS, "{a} vs {b}");
    }

    /// Run springs well past any animation
    fn settle(viewport: &mut Viewport, from: f64) -> f64 {
        let mut now = from;
        for _ in 0..400 {
            now += 16.0;
            viewport.update(now);
        }
        now
    }

    #[test]
    fn test_starts_at_home() {
        let viewport = square_viewport(ViewportSettings::default());
        assert_rect_eq(viewport.bounds(true), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(viewport.zoom(true), 1.0);
    }

    #[test]
    fn test_wide_container_centers_tall_image() {
        let viewport =
            Viewport::new(Point::new(800.0, 400.0), Point::new(1000.0, 1000.0), ViewportSettings::default(), 0.0);
        let bounds = viewport.bounds(true);
        assert!((bounds.height - 1.0).abs() < EPS);
        assert!((bounds.center().x - 0.5).abs() < EPS);
        assert!((viewport.home_zoom() - 0.5).abs() < EPS);
    }

    #[test]
    fn test_coordinate_round_trip() {
        let mut viewport = square_viewport(ViewportSettings::default());
        viewport.zoom_by(3.0, Some(Point::new(0.2, 0.7)), false);
        viewport.pan_by(Point::new(0.1, -0.05), false);
        viewport.update(400.0);

        for p in [Point::new(0.0, 0.0), Point::new(0.33, 0.9), Point::new(-2.0, 5.5)] {
            let back = viewport.point_from_pixel(viewport.pixel_from_point(p, true), true);
            assert!(back.distance(p) < EPS);
        }
    }

    #[test]
    fn test_zoom_limits() {
        let viewport = square_viewport(ViewportSettings::default());
        assert!((viewport.min_zoom() - 0.8).abs() < EPS);
        assert!((viewport.max_zoom() - 4.0).abs() < EPS);
    }

    #[test]
    fn test_pan_clamp() {
        let mut viewport = square_viewport(ViewportSettings { visibility_ratio: 0.5, ..Default::default() });
        viewport.pan_by(Point::new(1000.0, 0.0), true);
        viewport.apply_constraints(true);
        viewport.update(16.0);

        let bounds = viewport.bounds(false);
        assert!(bounds.x + bounds.width >= 0.5 * bounds.width);
        assert!(1.0 - bounds.x >= 0.5 * bounds.width - EPS);
        assert_rect_eq(viewport.bounds(true), bounds);
    }

    #[test]
    fn test_wrap_disables_clamp() {
        let mut viewport = square_viewport(ViewportSettings { wrap_horizontal: true, ..Default::default() });
        viewport.pan_by(Point::new(10.0, 0.0), true);
        viewport.apply_constraints(true);
        assert!((viewport.center(false).x - 10.5).abs() < EPS);
    }

    #[test]
    fn test_apply_constraints_idempotent() {
        let mut viewport = square_viewport(ViewportSettings::default());
        viewport.zoom_to(100.0, Some(Point::new(0.9, 0.1)), true);
        viewport.pan_by(Point::new(3.0, -2.0), true);
        let now = settle(&mut viewport, 0.0);

        viewport.apply_constraints(true);
        let now = settle(&mut viewport, now);
        let once = viewport.bounds(false);

        viewport.apply_constraints(true);
        settle(&mut viewport, now);
        assert_rect_eq(viewport.bounds(false), once);
        assert!(viewport.zoom(false) <= viewport.max_zoom() + EPS);
    }

    #[test]
    fn test_zoom_anchor_stays_put() {
        let mut viewport = square_viewport(ViewportSettings::default());
        let anchor = Point::new(0.25, 0.25);
        let pixel_before = viewport.pixel_from_point(anchor, true);

        viewport.zoom_by(2.0, Some(anchor), false);
        let mut now = 0.0;
        for _ in 0..10 {
            now += 50.0;
            viewport.update(now);
            let pixel = viewport.pixel_from_point(anchor, true);
            assert!(pixel.distance(pixel_before) < 1e-6);
        }
    }

    #[test]
    fn test_update_reports_animation() {
        let mut viewport = square_viewport(ViewportSettings::default());
        assert!(!viewport.update(10.0));
        viewport.pan_to(Point::new(0.6, 0.5), false);
        assert!(viewport.update(100.0));
        let now = settle(&mut viewport, 100.0);
        assert!(!viewport.update(now + 16.0));
        assert!((viewport.center(true).x - 0.6).abs() < EPS);
    }

    #[test]
    fn test_fit_bounds_target() {
        let mut viewport = square_viewport(ViewportSettings::default());
        viewport.fit_bounds(Rect::new(0.25, 0.25, 0.5, 0.25), false);
        let target = viewport.bounds(false);
        assert!((target.width - 0.5).abs() < EPS);
        assert!((target.center().x - 0.5).abs() < EPS);
        assert!((target.center().y - 0.375).abs() < EPS);

        settle(&mut viewport, 0.0);
        assert_rect_eq(viewport.bounds(true), target);
    }

    #[test]
    fn test_resize_maintains_zoom_level() {
        let mut viewport = square_viewport(ViewportSettings::default());
        viewport.resize(Point::new(1000.0, 500.0), true);
        viewport.update(16.0);
        let bounds = viewport.bounds(true);
        assert!((bounds.width - 2.0).abs() < EPS);
        assert!((bounds.height - 1.0).abs() < EPS);
    }

    #[test]
    fn test_go_home_folds_wrap() {
        let mut viewport = square_viewport(ViewportSettings { wrap_horizontal: true, ..Default::default() });
        viewport.pan_by(Point::new(10.0, 0.0), true);
        viewport.update(16.0);
        viewport.go_home(false);
        viewport.update(32.0);
        assert!((viewport.center(true).x - 0.5).abs() < EPS);
        assert!((viewport.center(false).x - 0.5).abs() < EPS);
    }

    #[test]
    fn test_immediate_jump_is_not_animation() {
        let mut viewport = square_viewport(ViewportSettings::default());
        let anchor = Point::new(0.25, 0.25);
        let pixel_before = viewport.pixel_from_point(anchor, true);

        viewport.zoom_to(2.0, Some(anchor), true);
        assert_eq!(viewport.zoom(true), 2.0);
        assert!(viewport.pixel_from_point(anchor, true).distance(pixel_before) < 1e-6);

        viewport.pan_by(Point::new(0.1, 0.0), true);
        assert!(!viewport.update(16.0));
        assert!(viewport.pixel_from_point(anchor, true).distance(pixel_before + Point::new(-100.0, 0.0)) < 1e-6);
    }

    #[test]
    fn test_fit_horizontally_folds_wrap() {
        let mut viewport = square_viewport(ViewportSettings { wrap_horizontal: true, ..Default::default() });
        viewport.pan_by(Point::new(3.0, 0.0), true);
        viewport.update(16.0);
        viewport.fit_horizontally(true);
        viewport.update(32.0);
        let center = viewport.center(true);
        assert!((center.x - 0.5).abs() < EPS);
    }
}
