#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

/// A point in either screen or canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are finite (not NaN or infinite).
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Angle in degrees of `self` around `pivot`, clockwise in screen space
    /// (y grows downward), in `(-180, 180]`.
    #[must_use]
    pub fn angle_around_deg(self, pivot: Point) -> f64 {
        (self.y - pivot.y).atan2(self.x - pivot.x).to_degrees()
    }
}

/// Maps the host element's CSS pixels onto canvas units.
///
/// The print area is laid out in canvas units; the host may letterbox and
/// zoom it inside the element. `pan_x` / `pan_y` are in CSS pixels and `zoom`
/// is CSS pixels per canvas unit.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a screen-space point (CSS pixels) to canvas coordinates.
    #[must_use]
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.pan_x) / self.zoom,
            y: (screen.y - self.pan_y) / self.zoom,
        }
    }

    /// Convert a canvas-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point {
            x: canvas.x * self.zoom + self.pan_x,
            y: canvas.y * self.zoom + self.pan_y,
        }
    }

    /// Convert a screen-space distance (pixels) to a canvas-space distance.
    #[must_use]
    pub fn screen_dist_to_canvas(&self, screen_dist: f64) -> f64 {
        screen_dist / self.zoom
    }

    /// Fit a canvas-space `width` x `height` area centered into a viewport,
    /// leaving `margin_px` on the tighter side.
    ///
    /// Returns the default camera when either side is degenerate.
    #[must_use]
    pub fn fit(width: f64, height: f64, viewport_w: f64, viewport_h: f64, margin_px: f64) -> Self {
        let avail_w = viewport_w - 2.0 * margin_px;
        let avail_h = viewport_h - 2.0 * margin_px;
        if width <= 0.0 || height <= 0.0 || avail_w <= 0.0 || avail_h <= 0.0 {
            return Self::default();
        }
        let zoom = (avail_w / width).min(avail_h / height);
        Self {
            pan_x: (viewport_w - width * zoom) / 2.0,
            pan_y: (viewport_h - height * zoom) / 2.0,
            zoom,
        }
    }
}
