//! Transform model: the mutable placement record of one object on the canvas.
//!
//! A `Transform` stores the object's intrinsic size, its center position,
//! scale factors, and rotation. The axis-aligned bounding box is derived from
//! those and cached; every setter recomputes it, so a `Transform` can never
//! hand out a stale box. Setters silently ignore non-finite input, which keeps
//! NaN out of the per-frame hot path without any error plumbing.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use serde::{Deserialize, Serialize};

use crate::angle::normalize_degrees_360;
use crate::camera::Point;
use crate::consts::MIN_EXTENT;

/// Axis-aligned rectangle in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Build the rectangle centered on `center` with the given half extents.
    #[must_use]
    pub fn from_center(center: Point, half_w: f64, half_h: f64) -> Self {
        Self { left: center.x - half_w, top: center.y - half_h, width: half_w * 2.0, height: half_h * 2.0 }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Finite coordinates and both extents above the degenerate threshold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > MIN_EXTENT
            && self.height > MIN_EXTENT
    }

    /// Whether the horizontal spans share a non-empty interval.
    #[must_use]
    pub fn overlaps_x(&self, other: &Rect) -> bool {
        self.left < other.right() && other.left < self.right()
    }

    /// Whether the vertical spans share a non-empty interval.
    #[must_use]
    pub fn overlaps_y(&self, other: &Rect) -> bool {
        self.top < other.bottom() && other.top < self.bottom()
    }

    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.left && pt.x <= self.right() && pt.y >= self.top && pt.y <= self.bottom()
    }
}

/// Per-axis scale factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Scale {
    #[must_use]
    pub fn uniform(factor: f64) -> Self {
        Self { x: factor, y: factor }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

/// Placement of one object: center anchor, scale, rotation, derived bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    position: Point,
    scale: Scale,
    rotation_deg: f64,
    width: f64,
    height: f64,
    bounding_box: Rect,
}

impl Transform {
    /// Unrotated, unscaled object of intrinsic `width` x `height` centered on `center`.
    #[must_use]
    pub fn new(center: Point, width: f64, height: f64) -> Self {
        let mut t = Self {
            position: center,
            scale: Scale::default(),
            rotation_deg: 0.0,
            width,
            height,
            bounding_box: Rect::default(),
        };
        t.recompute();
        t
    }

    // --- Accessors ---

    /// Center of the object in canvas units.
    #[must_use]
    pub fn position(&self) -> Point {
        self.position
    }

    #[must_use]
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Clockwise rotation in `[0, 360)`.
    #[must_use]
    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Intrinsic (unscaled) width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Intrinsic (unscaled) height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Axis-aligned bounds of the scaled, rotated object.
    #[must_use]
    pub fn bounding_box(&self) -> Rect {
        self.bounding_box
    }

    /// Width and height after scaling, before rotation.
    #[must_use]
    pub fn scaled_size(&self) -> (f64, f64) {
        (self.width * self.scale.x.abs(), self.height * self.scale.y.abs())
    }

    // --- Mutators ---

    pub fn set_position(&mut self, center: Point) {
        if !center.is_finite() {
            return;
        }
        self.position = center;
        self.recompute();
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.set_position(Point::new(self.position.x + dx, self.position.y + dy));
    }

    /// Set rotation in degrees; stored normalized to `[0, 360)`.
    pub fn set_rotation_deg(&mut self, deg: f64) {
        if !deg.is_finite() {
            return;
        }
        self.rotation_deg = normalize_degrees_360(deg);
        self.recompute();
    }

    pub fn set_scale(&mut self, scale: Scale) {
        if !scale.x.is_finite() || !scale.y.is_finite() {
            return;
        }
        self.scale = scale;
        self.recompute();
    }

    // --- Geometry ---

    /// The four corners of the rotated object: upper-left, upper-right,
    /// lower-right, lower-left (in the object's own frame).
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (w, h) = self.scaled_size();
        let (hw, hh) = (w / 2.0, h / 2.0);
        [
            self.to_canvas(Point::new(-hw, -hh)),
            self.to_canvas(Point::new(hw, -hh)),
            self.to_canvas(Point::new(hw, hh)),
            self.to_canvas(Point::new(-hw, hh)),
        ]
    }

    /// Map a canvas point into the object's unrotated frame, origin at center.
    #[must_use]
    pub fn to_local(&self, pt: Point) -> Point {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let dx = pt.x - self.position.x;
        let dy = pt.y - self.position.y;
        Point::new(dx * cos + dy * sin, -dx * sin + dy * cos)
    }

    /// Map a point in the object's unrotated frame back into canvas space.
    #[must_use]
    pub fn to_canvas(&self, local: Point) -> Point {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        Point::new(
            self.position.x + local.x * cos - local.y * sin,
            self.position.y + local.x * sin + local.y * cos,
        )
    }

    fn recompute(&mut self) {
        let (w, h) = self.scaled_size();
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let half_w = (w * cos.abs() + h * sin.abs()) / 2.0;
        let half_h = (w * sin.abs() + h * cos.abs()) / 2.0;
        self.bounding_box = Rect::from_center(self.position, half_w, half_h);
    }
}
