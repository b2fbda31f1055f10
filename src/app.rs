//! Viewer state and update loop
//!
//! `Viewer` ties the pieces together: it opens tile sources, owns the
//! viewport, drawer and loader of the open image, applies gestures and
//! runs one tick at a time. Hosts either call `update_once` from their own
//! frame loop (using `next_delay` to pace it) or hand a `RenderSurface` to
//! `run_until_settled`.

use crate::config::ViewerConfig;
use crate::events::{EventHandlers, EventKind, ViewerEvent};
use crate::geometry::Point;
use crate::input::{apply_gesture, Gesture};
use crate::loader::{ImageFetcher, ImageLoader};
use crate::overlay::{ElementId, OverlayLocation, Placement};
use crate::profiler::Profiler;
use crate::renderer::{Drawer, Frame, RenderSurface};
use crate::source::TileSource;
use crate::viewport::{Viewport, ViewportSettings};
use std::time::{Duration, Instant};

/// Identifies one `begin_open` call; only the latest may finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OpenTicket(u64);

/// Everything that exists only while a source is open
struct OpenImage {
    viewport: Viewport,
    drawer: Drawer,
    profiler: Profiler,
    prev_container_size: Point,
    animating: bool,
    force_redraw: bool,
}

/// Overlay registered on the viewer, re-added on every open
#[derive(Debug, Clone, Copy)]
struct OverlayControl {
    element: ElementId,
    location: OverlayLocation,
    placement: Placement,
    size: Point,
}

pub struct Viewer {
    config: ViewerConfig,
    events: EventHandlers,
    loader: ImageLoader,
    image: Option<OpenImage>,
    overlay_controls: Vec<OverlayControl>,
    last_open_start: u64,
    clock: Instant,
}

impl Viewer {
    pub fn new(config: ViewerConfig, fetcher: impl ImageFetcher + 'static) -> Self {
        let loader = ImageLoader::new(config.image_loader_limit, fetcher);
        Self {
            config,
            events: EventHandlers::new(),
            loader,
            image: None,
            overlay_controls: Vec::new(),
            last_open_start: 0,
            clock: Instant::now(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Milliseconds since the viewer was created, the time base of
    /// `run_until_settled`
    pub fn elapsed_ms(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    pub fn add_handler(&mut self, kind: EventKind, handler: impl FnMut(&ViewerEvent) + Send + 'static) {
        self.events.add_handler(kind, handler);
    }

    pub fn clear_handlers(&mut self, kind: EventKind) {
        self.events.clear(kind);
    }

    pub fn is_open(&self) -> bool {
        self.image.is_some()
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.image.as_ref().map(|image| &image.viewport)
    }

    /// Direct viewport access; the next tick redraws
    pub fn viewport_mut(&mut self) -> Option<&mut Viewport> {
        self.image.as_mut().map(|image| {
            image.force_redraw = true;
            &mut image.viewport
        })
    }

    pub fn drawer(&self) -> Option<&Drawer> {
        self.image.as_ref().map(|image| &image.drawer)
    }

    pub fn source(&self) -> Option<&TileSource> {
        self.drawer().map(Drawer::source)
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.image.as_ref().map(|image| &image.profiler)
    }

    pub fn is_animating(&self) -> bool {
        self.image.as_ref().is_some_and(|image| image.animating)
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Start opening a new source. The current image closes right away.
    pub fn begin_open(&mut self) -> OpenTicket {
        if self.image.is_some() {
            self.close();
        }
        self.last_open_start += 1;
        OpenTicket(self.last_open_start)
    }

    /// Finish the open started by `ticket`. Out-of-date opens are dropped.
    pub fn finish_open(
        &mut self,
        ticket: OpenTicket,
        source: anyhow::Result<TileSource>,
        container_size: Point,
        now: f64,
    ) {
        if ticket.0 < self.last_open_start {
            tracing::info!("Ignoring out-of-date open");
            self.events.raise(&ViewerEvent::Ignore);
            return;
        }
        let source = match source {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("Open failed: {:#}", e);
                self.events.raise(&ViewerEvent::OpenFailed { reason: format!("{:#}", e) });
                return;
            }
        };

        let viewport = Viewport::new(
            container_size,
            source.dimensions(),
            ViewportSettings::from(&self.config),
            now,
        );
        let mut drawer = Drawer::new(source, &self.config, now);
        for control in &self.overlay_controls {
            drawer.add_overlay(control.element, control.location, control.placement, control.size);
        }

        let d = drawer.source().dimensions();
        tracing::info!("Opened {}x{} image in {}x{} container", d.x, d.y, container_size.x, container_size.y);

        self.image = Some(OpenImage {
            viewport,
            drawer,
            profiler: Profiler::new(),
            prev_container_size: container_size,
            animating: false,
            force_redraw: true,
        });
        self.events.raise(&ViewerEvent::Open);
    }

    /// Open an already constructed source
    pub fn open(&mut self, source: TileSource, container_size: Point, now: f64) {
        let ticket = self.begin_open();
        self.finish_open(ticket, Ok(source), container_size, now);
    }

    pub fn close(&mut self) {
        if self.image.take().is_some() {
            tracing::info!("Viewer closed");
        }
    }

    /// Apply one user gesture. Returns true when the view may change.
    pub fn handle_gesture(&mut self, gesture: Gesture) -> bool {
        let Some(image) = self.image.as_mut() else {
            return false;
        };
        let changed = apply_gesture(&mut image.viewport, &self.config, gesture);
        image.force_redraw |= changed;
        changed
    }

    pub fn go_home(&mut self, immediately: bool) {
        if let Some(viewport) = self.viewport_mut() {
            viewport.go_home(immediately);
        }
    }

    /// Run one tick. Returns the frame when the drawer ran.
    pub fn update_once(&mut self, container_size: Point, now: f64) -> Option<Frame> {
        let completions = self.loader.drain();
        let image = self.image.as_mut()?;

        image.profiler.begin_update();

        for completion in completions {
            image.drawer.on_tile_load(completion);
        }

        if container_size != image.prev_container_size {
            // keep the image position
            image.viewport.resize(container_size, true);
            image.prev_container_size = container_size;
            self.events.raise(&ViewerEvent::Resize { size: container_size });
        }

        let animated = image.viewport.update(now);

        if !image.animating && animated {
            self.events.raise(&ViewerEvent::AnimationStart);
        }

        let frame = if animated {
            let frame = image.drawer.update(&image.viewport, &mut self.loader, now);
            self.events.raise(&ViewerEvent::Animation);
            Some(frame)
        } else if image.force_redraw || image.drawer.needs_update() {
            image.force_redraw = false;
            Some(image.drawer.update(&image.viewport, &mut self.loader, now))
        } else {
            None
        };

        if image.animating && !animated {
            self.events.raise(&ViewerEvent::AnimationFinish);
        }
        image.animating = animated;

        image.profiler.end_update();
        frame
    }

    /// Delay in ms before the next tick, `None` once nothing is left to do
    pub fn next_delay(&self, prev_tick: f64, now: f64) -> Option<f64> {
        let image = self.image.as_ref()?;
        if image.animating {
            return Some(1.0);
        }
        if !image.force_redraw && !image.drawer.needs_update() && self.loader.is_idle() {
            return None;
        }
        let target = prev_tick + self.config.frame_interval_ms();
        Some((target - now).max(1.0))
    }

    /// Tick until the view settles, presenting every drawn frame. Returns
    /// the number of frames presented.
    pub async fn run_until_settled(&mut self, container_size: Point, surface: &mut impl RenderSurface) -> usize {
        let mut presented = 0;
        loop {
            let begin = self.elapsed_ms();
            if let Some(frame) = self.update_once(container_size, begin) {
                surface.present(&frame);
                presented += 1;
            }
            let Some(delay) = self.next_delay(begin, self.elapsed_ms()) else {
                break;
            };
            tokio::time::sleep(Duration::from_secs_f64(delay / 1000.0)).await;
        }
        tracing::debug!("Settled after {} frames", presented);
        presented
    }

    /// Register an overlay; it is kept across opens
    pub fn add_overlay(&mut self, element: ElementId, location: OverlayLocation, placement: Placement, size: Point) {
        if self.overlay_controls.iter().any(|c| c.element == element) {
            return;
        }
        self.overlay_controls.push(OverlayControl {
            element,
            location,
            placement,
            size,
        });
        if let Some(image) = self.image.as_mut() {
            image.drawer.add_overlay(element, location, placement, size);
        }
    }

    pub fn update_overlay(&mut self, element: ElementId, location: OverlayLocation, placement: Placement) {
        if let Some(control) = self.overlay_controls.iter_mut().find(|c| c.element == element) {
            control.location = location;
            control.placement = placement;
        }
        if let Some(image) = self.image.as_mut() {
            image.drawer.update_overlay(element, location, placement);
        }
    }

    pub fn remove_overlay(&mut self, element: ElementId) {
        self.overlay_controls.retain(|c| c.element != element);
        if let Some(image) = self.image.as_mut() {
            image.drawer.remove_overlay(element);
        }
    }

    pub fn clear_overlays(&mut self) {
        self.overlay_controls.clear();
        if let Some(image) = self.image.as_mut() {
            image.drawer.clear_overlays();
        }
    }
}
