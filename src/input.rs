//! Gesture input
//!
//! Hosts translate their pointer/touch/wheel events into `Gesture`s in
//! container pixel coordinates; `apply_gesture` turns them into viewport
//! motion. `ClickDetector` decides whether a press/release pair counts as
//! a quick click.

use crate::config::ViewerConfig;
use crate::geometry::Point;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Press and release; only `quick` clicks zoom
    Click { position: Point, quick: bool, shift: bool },
    /// Pointer moved with the button held, `delta` in pixels
    Drag { position: Point, delta: Point, shift: bool },
    /// Button released; `inside_press` when the press began on the viewer
    Release { inside_press: bool },
    /// Wheel movement in lines, positive zooms in
    Scroll { position: Point, scroll: f64, shift: bool },
    /// Two-finger pinch, `distance_delta` in pixels, positive spreads
    Pinch { center: Point, distance_delta: f64 },
}

/// Move the viewport for `gesture`. Returns true when the view may change.
pub fn apply_gesture(viewport: &mut Viewport, config: &ViewerConfig, gesture: Gesture) -> bool {
    match gesture {
        Gesture::Click { position, quick, shift } => {
            // ignore clicks where the pointer moved
            if !quick {
                return false;
            }
            let factor = if shift { 1.0 / config.zoom_per_click } else { config.zoom_per_click };
            let anchor = viewport.point_from_pixel(position, true);
            viewport.zoom_by(factor, Some(anchor), false);
            viewport.apply_constraints(false);
        }
        Gesture::Drag { delta, .. } => {
            let delta_points = viewport.delta_points_from_pixels(-delta, false);
            viewport.pan_by(delta_points, false);
        }
        Gesture::Release { inside_press } => {
            if !inside_press {
                return false;
            }
            // pull a view dragged past the edges back in
            viewport.ensure_visible(false);
        }
        Gesture::Scroll { position, scroll, .. } => {
            let factor = config.zoom_per_scroll.powf(scroll);
            let anchor = viewport.point_from_pixel(position, true);
            viewport.zoom_by(factor, Some(anchor), false);
            viewport.apply_constraints(false);
        }
        Gesture::Pinch { center, distance_delta } => {
            let factor = config.zoom_per_scroll.powf(distance_delta / config.pixels_per_wheel_line);
            let anchor = viewport.point_from_pixel(center, true);
            viewport.zoom_by(factor, Some(anchor), false);
            viewport.apply_constraints(false);
        }
    }
    true
}

/// Tracks one press to classify the matching release
#[derive(Debug, Clone, Default)]
pub struct ClickDetector {
    press: Option<(Point, f64)>,
}

impl ClickDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, position: Point, now: f64) {
        self.press = Some((position, now));
    }

    /// True when the release came soon enough and close enough to the press
    pub fn release(&mut self, position: Point, now: f64, config: &ViewerConfig) -> bool {
        match self.press.take() {
            Some((at, time)) => {
                now - time <= config.click_time_threshold && at.distance(position) <= config.click_dist_threshold
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ViewportSettings;

    fn viewport(config: &ViewerConfig) -> Viewport {
        Viewport::new(Point::new(500.0, 500.0), Point::new(1000.0, 1000.0), ViewportSettings::from(config), 0.0)
    }

    #[test]
    fn test_quick_click_zooms_about_point() {
        let config = ViewerConfig::default();
        let mut vp = viewport(&config);

        assert!(apply_gesture(&mut vp, &config, Gesture::Click { position: Point::new(250.0, 250.0), quick: true, shift: false }));
        assert!((vp.zoom(false) - 2.0).abs() < 1e-12);

        assert!(apply_gesture(&mut vp, &config, Gesture::Click { position: Point::new(250.0, 250.0), quick: true, shift: true }));
        assert!((vp.zoom(false) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slow_click_is_ignored() {
        let config = ViewerConfig::default();
        let mut vp = viewport(&config);
        assert!(!apply_gesture(&mut vp, &config, Gesture::Click { position: Point::ZERO, quick: false, shift: false }));
        assert_eq!(vp.zoom(false), 1.0);
    }

    #[test]
    fn test_drag_pans_opposite_to_pointer() {
        let config = ViewerConfig::default();
        let mut vp = viewport(&config);
        apply_gesture(
            &mut vp,
            &config,
            Gesture::Drag { position: Point::ZERO, delta: Point::new(50.0, -100.0), shift: false },
        );
        let center = vp.center(false);
        assert!((center.x - 0.4).abs() < 1e-12);
        assert!((center.y - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_scroll_and_pinch_share_zoom_rate() {
        let config = ViewerConfig::default();
        let mut scrolled = viewport(&config);
        let mut pinched = viewport(&config);

        apply_gesture(
            &mut scrolled,
            &config,
            Gesture::Scroll { position: Point::new(250.0, 250.0), scroll: 2.0, shift: false },
        );
        apply_gesture(
            &mut pinched,
            &config,
            Gesture::Pinch { center: Point::new(250.0, 250.0), distance_delta: 2.0 * config.pixels_per_wheel_line },
        );
        assert!((scrolled.zoom(false) - 1.44).abs() < 1e-9);
        assert!((pinched.zoom(false) - scrolled.zoom(false)).abs() < 1e-9);
    }

    #[test]
    fn test_release_applies_constraints() {
        let config = ViewerConfig::default();
        let mut vp = viewport(&config);
        vp.pan_by(Point::new(5.0, 0.0), false);

        assert!(!apply_gesture(&mut vp, &config, Gesture::Release { inside_press: false }));
        assert!(vp.center(false).x > 5.0);

        assert!(apply_gesture(&mut vp, &config, Gesture::Release { inside_press: true }));
        assert!(vp.bounds(false).x <= 0.5 + 1e-9);
    }

    #[test]
    fn test_click_detector_thresholds() {
        let config = ViewerConfig::default();
        let mut clicks = ClickDetector::new();

        clicks.press(Point::new(10.0, 10.0), 0.0);
        assert!(clicks.release(Point::new(12.0, 13.0), 150.0, &config));

        clicks.press(Point::new(10.0, 10.0), 0.0);
        assert!(!clicks.release(Point::new(10.0, 10.0), 500.0, &config));

        clicks.press(Point::new(10.0, 10.0), 0.0);
        assert!(!clicks.release(Point::new(30.0, 10.0), 50.0, &config));

        assert!(!clicks.release(Point::ZERO, 0.0, &config));
    }
}
