//! Pointer tracker: the last known pointer position in canvas space.

#[cfg(test)]
#[path = "pointer_test.rs"]
mod pointer_test;

use crate::camera::{Camera, Point};

/// Remembers where the pointer was last seen, in canvas coordinates.
///
/// Non-finite samples (which some browsers emit for synthetic events) are
/// dropped and leave the previous point in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTracker {
    last: Option<Point>,
}

impl PointerTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample already expressed in canvas coordinates.
    ///
    /// Returns the recorded point, or `None` if the sample was dropped.
    pub fn record(&mut self, canvas_pt: Point) -> Option<Point> {
        if !canvas_pt.is_finite() {
            return None;
        }
        self.last = Some(canvas_pt);
        self.last
    }

    /// Record a screen-space sample, converting it through `camera`.
    pub fn record_screen(&mut self, screen_pt: Point, camera: &Camera) -> Option<Point> {
        self.record(camera.screen_to_canvas(screen_pt))
    }

    /// The latest recorded canvas point.
    #[must_use]
    pub fn last(&self) -> Option<Point> {
        self.last
    }

    /// Forget the last point (pointer left the canvas).
    pub fn clear(&mut self) {
        self.last = None;
    }
}
