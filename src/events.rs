//! Viewer lifecycle events
//!
//! Listeners register per `EventKind` and are called synchronously, in
//! registration order, when the viewer raises a matching event. A listener
//! added after an event fired does not see it.

use crate::geometry::Point;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// A source finished opening and the view is live
    Open,
    /// Opening a source failed
    OpenFailed { reason: String },
    /// An open completed after a newer one started and was dropped
    Ignore,
    /// The container changed size
    Resize { size: Point },
    AnimationStart,
    /// A frame was drawn while the view was moving
    Animation,
    AnimationFinish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    OpenFailed,
    Ignore,
    Resize,
    AnimationStart,
    Animation,
    AnimationFinish,
}

impl ViewerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ViewerEvent::Open => EventKind::Open,
            ViewerEvent::OpenFailed { .. } => EventKind::OpenFailed,
            ViewerEvent::Ignore => EventKind::Ignore,
            ViewerEvent::Resize { .. } => EventKind::Resize,
            ViewerEvent::AnimationStart => EventKind::AnimationStart,
            ViewerEvent::Animation => EventKind::Animation,
            ViewerEvent::AnimationFinish => EventKind::AnimationFinish,
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&ViewerEvent) + Send>;

#[derive(Default)]
pub struct EventHandlers {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, kind: EventKind, handler: impl FnMut(&ViewerEvent) + Send + 'static) {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Drop every listener of `kind`
    pub fn clear(&mut self, kind: EventKind) {
        self.handlers.remove(&kind);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    pub fn raise(&mut self, event: &ViewerEvent) {
        tracing::debug!("Event: {:?}", event);
        if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
            for handler in handlers.iter_mut() {
                handler(event);
            }
        }
    }
}
