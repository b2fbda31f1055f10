//! Overlays pinned to image coordinates
//!
//! An overlay is a host element (identified by `ElementId`) anchored at a
//! point or stretched over a rectangle of image space. Point overlays keep
//! the element's own size; rect overlays scale with zoom and always anchor
//! at their top-left corner.

use crate::geometry::{Point, PointExt, Rect};
use crate::viewport::Viewport;
use std::fmt;

/// Host-side identifier of an overlay element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which part of the element sits on the anchor point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    Center,
    #[default]
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Placement {
    pub const ALL: [Placement; 9] = [
        Placement::Center,
        Placement::TopLeft,
        Placement::Top,
        Placement::TopRight,
        Placement::Right,
        Placement::BottomRight,
        Placement::Bottom,
        Placement::BottomLeft,
        Placement::Left,
    ];

    /// Shift `position` so the anchor lands on the chosen part of `size`
    pub fn adjust(self, position: Point, size: Point) -> Point {
        let offset = match self {
            Placement::TopLeft => Point::ZERO,
            Placement::Top => Point::new(size.x / 2.0, 0.0),
            Placement::TopRight => Point::new(size.x, 0.0),
            Placement::Right => Point::new(size.x, size.y / 2.0),
            Placement::BottomRight => size,
            Placement::Bottom => Point::new(size.x / 2.0, size.y),
            Placement::BottomLeft => Point::new(0.0, size.y),
            Placement::Left => Point::new(0.0, size.y / 2.0),
            Placement::Center => size / 2.0,
        };
        position - offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayLocation {
    Point(Point),
    Rect(Rect),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub element: ElementId,
    location: OverlayLocation,
    placement: Placement,
    /// Element's own size in pixels, used by point overlays
    element_size: Point,
}

impl Overlay {
    pub fn new(element: ElementId, location: OverlayLocation, placement: Placement, element_size: Point) -> Self {
        let mut overlay = Self {
            element,
            location,
            placement,
            element_size,
        };
        overlay.update(location, placement);
        overlay
    }

    /// Move the overlay; rects override the placement with top-left
    pub fn update(&mut self, location: OverlayLocation, placement: Placement) {
        self.location = location;
        self.placement = match location {
            OverlayLocation::Point(_) => placement,
            OverlayLocation::Rect(_) => Placement::TopLeft,
        };
    }

    pub fn set_element_size(&mut self, size: Point) {
        self.element_size = size;
    }

    pub fn location(&self) -> OverlayLocation {
        self.location
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// True when the overlay stretches with zoom
    pub fn scales(&self) -> bool {
        matches!(self.location, OverlayLocation::Rect(_))
    }

    /// Pixel placement for the current frame
    pub fn position(&self, viewport: &Viewport) -> OverlayDraw {
        let (anchor, size) = match self.location {
            OverlayLocation::Point(p) => (viewport.pixel_from_point(p, true), self.element_size),
            OverlayLocation::Rect(r) => (
                viewport.pixel_from_point(r.top_left(), true),
                viewport.delta_pixels_from_points(r.size(), true),
            ),
        };
        let position = self.placement.adjust(anchor, size);

        OverlayDraw {
            element: self.element,
            position: position.apply(f64::floor),
            size: size.apply(f64::ceil),
            scales: self.scales(),
        }
    }
}

/// Where the host should put an overlay element this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayDraw {
    pub element: ElementId,
    pub position: Point,
    pub size: Point,
    /// When false the host keeps the element's own size
    pub scales: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ViewportSettings;

    fn viewport() -> Viewport {
        Viewport::new(Point::new(400.0, 400.0), Point::new(1000.0, 1000.0), ViewportSettings::default(), 0.0)
    }

    #[test]
    fn test_placements() {
        let p = Point::new(100.0, 100.0);
        let size = Point::new(20.0, 10.0);
        let expect = [
            (Placement::Center, Point::new(90.0, 95.0)),
            (Placement::TopLeft, Point::new(100.0, 100.0)),
            (Placement::Top, Point::new(90.0, 100.0)),
            (Placement::TopRight, Point::new(80.0, 100.0)),
            (Placement::Right, Point::new(80.0, 95.0)),
            (Placement::BottomRight, Point::new(80.0, 90.0)),
            (Placement::Bottom, Point::new(90.0, 90.0)),
            (Placement::BottomLeft, Point::new(100.0, 90.0)),
            (Placement::Left, Point::new(100.0, 95.0)),
        ];
        for (placement, want) in expect {
            assert_eq!(placement.adjust(p, size), want, "{placement:?}");
        }
        assert_eq!(Placement::ALL.len(), 9);
    }

    #[test]
    fn test_rect_overlay_is_top_left_and_scales() {
        let overlay = Overlay::new(
            ElementId(1),
            OverlayLocation::Rect(Rect::new(0.25, 0.25, 0.5, 0.25)),
            Placement::Center,
            Point::ZERO,
        );
        assert_eq!(overlay.placement(), Placement::TopLeft);

        let draw = overlay.position(&viewport());
        assert!(draw.scales);
        assert_eq!(draw.position, Point::new(100.0, 100.0));
        assert_eq!(draw.size, Point::new(200.0, 100.0));
    }

    #[test]
    fn test_point_overlay_uses_element_size() {
        let mut overlay = Overlay::new(
            ElementId(2),
            OverlayLocation::Point(Point::new(0.5, 0.5)),
            Placement::Center,
            Point::new(31.0, 11.0),
        );
        let draw = overlay.position(&viewport());
        assert!(!draw.scales);
        // floored position, ceiled size
        assert_eq!(draw.position, Point::new(184.0, 194.0));
        assert_eq!(draw.size, Point::new(31.0, 11.0));

        overlay.update(OverlayLocation::Rect(Rect::new(0.0, 0.0, 0.1, 0.1)), Placement::Bottom);
        assert_eq!(overlay.placement(), Placement::TopLeft);
    }
}
