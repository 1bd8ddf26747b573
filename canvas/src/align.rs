//! Alignment engine: magnetic snapping with hysteresis during gestures.
//!
//! While a move gesture is active, each translation axis is pulled onto the
//! print-area centerline, or failing that onto the nearest print-area edge,
//! whenever it comes within the snap threshold. Once pulled in, the axis stays
//! pinned no matter where the pointer goes until the pointer has travelled more
//! than the release threshold away from where it was when the lock engaged.
//! Rotation gestures do the same against the four cardinal angles. Scaling is
//! applied as-is.
//!
//! Lock state lives in a [`GestureLockState`] owned by the active gesture and
//! passed in by `&mut` on every frame. Nothing here allocates, and nothing
//! here fails: degenerate geometry or a non-finite pointer makes the frame a
//! no-op (or a plain free-track when only snapping is impossible).

#[cfg(test)]
#[path = "align_test.rs"]
mod align_test;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::angle::{angular_delta_deg, nearest_cardinal_within, normalize_degrees_360, signed_angle_delta_deg};
use crate::camera::Point;
use crate::consts::{
    MIN_PIVOT_DISTANCE, RECOVERY_OVERLAP, RELEASE_THRESHOLD, ROTATION_RELEASE_DEG, ROTATION_SNAP_DEG, SNAP_THRESHOLD,
};
use crate::transform::{Rect, Scale, Transform};

// =============================================================================
// CONFIG
// =============================================================================

/// Snap and release distances. Linear values are canvas units, angular ones degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    pub snap_threshold: f64,
    pub release_threshold: f64,
    pub rotation_snap_deg: f64,
    pub rotation_release_deg: f64,
    pub recovery_overlap: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            snap_threshold: SNAP_THRESHOLD,
            release_threshold: RELEASE_THRESHOLD,
            rotation_snap_deg: ROTATION_SNAP_DEG,
            rotation_release_deg: ROTATION_RELEASE_DEG,
            recovery_overlap: RECOVERY_OVERLAP,
        }
    }
}

impl AlignConfig {
    /// Replace non-finite or negative values with defaults and raise each
    /// release threshold to at least its snap threshold.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let snap_threshold = non_negative_or(self.snap_threshold, SNAP_THRESHOLD);
        let rotation_snap_deg = non_negative_or(self.rotation_snap_deg, ROTATION_SNAP_DEG);
        Self {
            snap_threshold,
            release_threshold: non_negative_or(self.release_threshold, RELEASE_THRESHOLD).max(snap_threshold),
            rotation_snap_deg,
            rotation_release_deg: non_negative_or(self.rotation_release_deg, ROTATION_RELEASE_DEG)
                .max(rotation_snap_deg),
            recovery_overlap: non_negative_or(self.recovery_overlap, RECOVERY_OVERLAP),
        }
    }
}

fn non_negative_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 0.0 { value } else { default }
}

// =============================================================================
// LOCK STATE
// =============================================================================

/// A translation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// A print-area edge an object can be locked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Border {
    Left,
    Right,
    Top,
    Bottom,
}

/// Lock on one translation axis. A single enum per axis makes center and
/// border locks mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AxisLock {
    /// The axis follows the pointer.
    #[default]
    Free,
    /// Object center pinned to the print-area centerline.
    Center {
        /// Pointer coordinate on this axis when the lock engaged.
        anchor: f64,
        /// Pinned object-center coordinate.
        target: f64,
    },
    /// Object edge pinned to a print-area edge.
    Border {
        edge: Border,
        /// Pointer coordinate on this axis when the lock engaged.
        anchor: f64,
        /// Pinned object-center coordinate that puts the edge on the border.
        target: f64,
    },
}

impl AxisLock {
    #[must_use]
    pub fn is_locked(self) -> bool {
        !matches!(self, Self::Free)
    }

    fn anchor_and_target(self) -> Option<(f64, f64)> {
        match self {
            Self::Free => None,
            Self::Center { anchor, target } | Self::Border { anchor, target, .. } => Some((anchor, target)),
        }
    }
}

/// Lock on the rotation angle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RotationLock {
    #[default]
    Free,
    Locked {
        /// Cardinal angle the object is pinned to.
        angle_deg: f64,
        /// Pointer angle around the pivot when the lock engaged.
        anchor_pointer_deg: f64,
    },
}

/// All locks of one gesture. Created at gesture start, dropped at gesture end.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GestureLockState {
    pub x: AxisLock,
    pub y: AxisLock,
    pub rotation: RotationLock,
}

impl GestureLockState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every lock.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn axis(&self, axis: Axis) -> AxisLock {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    /// Flatten the locks into the booleans a guide renderer needs.
    #[must_use]
    pub fn indicators(&self) -> LockIndicators {
        let border = |lock: AxisLock, edge: Border| matches!(lock, AxisLock::Border { edge: e, .. } if e == edge);
        LockIndicators {
            center_x: matches!(self.x, AxisLock::Center { .. }),
            center_y: matches!(self.y, AxisLock::Center { .. }),
            left: border(self.x, Border::Left),
            right: border(self.x, Border::Right),
            top: border(self.y, Border::Top),
            bottom: border(self.y, Border::Bottom),
            rotation: matches!(self.rotation, RotationLock::Locked { .. }),
        }
    }
}

/// Guide-line state for the external renderer. All false means "unlocked".
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockIndicators {
    /// Vertical center guide (object centered horizontally).
    pub center_x: bool,
    /// Horizontal center guide (object centered vertically).
    pub center_y: bool,
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
    pub rotation: bool,
}

impl LockIndicators {
    #[must_use]
    pub fn any(&self) -> bool {
        self.center_x || self.center_y || self.left || self.right || self.top || self.bottom || self.rotation
    }
}

// =============================================================================
// GESTURE CONTEXT
// =============================================================================

/// Context captured when a move gesture starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveGesture {
    pub start_pointer: Point,
    pub start_center: Point,
}

impl MoveGesture {
    #[must_use]
    pub fn begin(transform: &Transform, pointer: Point) -> Self {
        Self { start_pointer: pointer, start_center: transform.position() }
    }
}

/// Context captured when a rotate gesture starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateGesture {
    /// Object center at gesture start; rotation pivots here.
    pub pivot: Point,
    pub start_rotation_deg: f64,
    pub start_pointer_deg: f64,
}

impl RotateGesture {
    /// `None` when the pointer sits on the pivot and has no defined angle.
    #[must_use]
    pub fn begin(transform: &Transform, pointer: Point) -> Option<Self> {
        let pivot = transform.position();
        if !pointer.is_finite() || pointer.distance_to(pivot) < MIN_PIVOT_DISTANCE {
            return None;
        }
        Some(Self {
            pivot,
            start_rotation_deg: transform.rotation_deg(),
            start_pointer_deg: pointer.angle_around_deg(pivot),
        })
    }
}

/// Context captured when a scale gesture starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleGesture {
    pub pivot: Point,
    pub start_scale: Scale,
    /// Pointer distance from the pivot at gesture start; zero for pinch gestures.
    pub start_distance: f64,
}

impl ScaleGesture {
    /// Handle-driven scaling. `None` when the pointer sits on the pivot.
    #[must_use]
    pub fn begin(transform: &Transform, pointer: Point) -> Option<Self> {
        let pivot = transform.position();
        let start_distance = pointer.distance_to(pivot);
        if !start_distance.is_finite() || start_distance < MIN_PIVOT_DISTANCE {
            return None;
        }
        Some(Self { pivot, start_scale: transform.scale(), start_distance })
    }

    /// Host-driven scaling (pinch), fed factors relative to gesture start.
    #[must_use]
    pub fn begin_pinch(transform: &Transform) -> Self {
        Self { pivot: transform.position(), start_scale: transform.scale(), start_distance: 0.0 }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Applies snapping rules for one print area.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentEngine {
    config: AlignConfig,
    print_area: Rect,
}

impl AlignmentEngine {
    #[must_use]
    pub fn new(print_area: Rect, config: AlignConfig) -> Self {
        Self { config: config.sanitized(), print_area }
    }

    #[must_use]
    pub fn config(&self) -> AlignConfig {
        self.config
    }

    #[must_use]
    pub fn print_area(&self) -> Rect {
        self.print_area
    }

    pub fn set_print_area(&mut self, print_area: Rect) {
        self.print_area = print_area;
    }

    pub fn set_config(&mut self, config: AlignConfig) {
        self.config = config.sanitized();
    }

    // --- Move ---

    /// One move frame. Returns whether the object position changed.
    pub fn apply_move(
        &self,
        gesture: &MoveGesture,
        locks: &mut GestureLockState,
        transform: &mut Transform,
        pointer: Point,
    ) -> bool {
        if !pointer.is_finite() {
            return false;
        }
        let free = Point::new(
            gesture.start_center.x + (pointer.x - gesture.start_pointer.x),
            gesture.start_center.y + (pointer.y - gesture.start_pointer.y),
        );
        if !free.is_finite() {
            return false;
        }

        let before = transform.position();
        let bb = transform.bounding_box();
        if !bb.is_valid() || !self.print_area.is_valid() {
            trace!("degenerate geometry; tracking without snapping");
            transform.set_position(free);
            return transform.position() != before;
        }

        let x = self.resolve_axis(&mut locks.x, Axis::X, free.x, pointer.x, bb.width / 2.0);
        let y = self.resolve_axis(&mut locks.y, Axis::Y, free.y, pointer.y, bb.height / 2.0);
        transform.set_position(Point::new(x, y));
        transform.position() != before
    }

    /// Decide the object-center coordinate for one axis, updating its lock.
    fn resolve_axis(&self, lock: &mut AxisLock, axis: Axis, free: f64, pointer: f64, half_extent: f64) -> f64 {
        if let Some((anchor, target)) = lock.anchor_and_target() {
            if (pointer - anchor).abs() > self.config.release_threshold {
                debug!("{axis:?} lock released: {lock:?}");
                *lock = AxisLock::Free;
                return free;
            }
            return target;
        }

        match self.engage_axis(axis, free, pointer, half_extent) {
            Some(engaged) => {
                debug!("{axis:?} lock engaged: {engaged:?}");
                *lock = engaged;
                engaged.anchor_and_target().map_or(free, |(_, target)| target)
            }
            None => free,
        }
    }

    /// Centerline first, then the closer of the two edges on this axis.
    fn engage_axis(&self, axis: Axis, center: f64, pointer: f64, half_extent: f64) -> Option<AxisLock> {
        let area = &self.print_area;
        let snap = self.config.snap_threshold;
        let (centerline, low_edge, high_edge, low_border, high_border) = match axis {
            Axis::X => (area.center().x, area.left, area.right(), Border::Left, Border::Right),
            Axis::Y => (area.center().y, area.top, area.bottom(), Border::Top, Border::Bottom),
        };

        if (center - centerline).abs() < snap {
            return Some(AxisLock::Center { anchor: pointer, target: centerline });
        }

        let low_dist = (center - half_extent - low_edge).abs();
        let high_dist = (center + half_extent - high_edge).abs();
        let (dist, edge, target) = if low_dist <= high_dist {
            (low_dist, low_border, low_edge + half_extent)
        } else {
            (high_dist, high_border, high_edge - half_extent)
        };
        (dist < snap).then_some(AxisLock::Border { edge, anchor: pointer, target })
    }

    // --- Rotate ---

    /// One rotate frame. Returns whether the rotation changed.
    pub fn apply_rotate(
        &self,
        gesture: &RotateGesture,
        locks: &mut GestureLockState,
        transform: &mut Transform,
        pointer: Point,
    ) -> bool {
        if !pointer.is_finite() || pointer.distance_to(gesture.pivot) < MIN_PIVOT_DISTANCE {
            return false;
        }
        let pointer_deg = pointer.angle_around_deg(gesture.pivot);
        let free = normalize_degrees_360(
            gesture.start_rotation_deg + signed_angle_delta_deg(pointer_deg, gesture.start_pointer_deg),
        );

        let angle = match locks.rotation {
            RotationLock::Locked { angle_deg, anchor_pointer_deg } => {
                if angular_delta_deg(pointer_deg, anchor_pointer_deg) > self.config.rotation_release_deg {
                    debug!("rotation lock at {angle_deg} released");
                    locks.rotation = RotationLock::Free;
                    free
                } else {
                    angle_deg
                }
            }
            RotationLock::Free => match nearest_cardinal_within(free, self.config.rotation_snap_deg) {
                Some(cardinal) => {
                    debug!("rotation lock engaged at {cardinal}");
                    locks.rotation = RotationLock::Locked { angle_deg: cardinal, anchor_pointer_deg: pointer_deg };
                    cardinal
                }
                None => free,
            },
        };

        let before = transform.rotation_deg();
        transform.set_rotation_deg(angle);
        transform.set_position(gesture.pivot);
        (transform.rotation_deg() - before).abs() > 0.0
    }

    // --- Scale ---

    /// One handle-driven scale frame. No snapping.
    pub fn apply_scale(&self, gesture: &ScaleGesture, transform: &mut Transform, pointer: Point) -> bool {
        if !pointer.is_finite() || gesture.start_distance < MIN_PIVOT_DISTANCE {
            return false;
        }
        self.apply_scale_factor(gesture, transform, pointer.distance_to(gesture.pivot) / gesture.start_distance)
    }

    /// Scale by `factor` relative to the gesture's starting scale. No snapping.
    pub fn apply_scale_factor(&self, gesture: &ScaleGesture, transform: &mut Transform, factor: f64) -> bool {
        if !factor.is_finite() {
            return false;
        }
        let before = transform.scale();
        transform.set_scale(Scale { x: gesture.start_scale.x * factor, y: gesture.start_scale.y * factor });
        transform.set_position(gesture.pivot);
        transform.scale() != before
    }

    // --- Gesture end ---

    /// Clear every lock and pull a fully escaped object back into view.
    /// Returns whether the object moved.
    pub fn end_gesture(&self, locks: &mut GestureLockState, transform: &mut Transform) -> bool {
        locks.reset();
        self.recover_escaped(transform)
    }

    /// Translate an object with no overlap on an axis back until a sliver of
    /// it overlaps the print area. Partially overlapping axes are untouched.
    pub fn recover_escaped(&self, transform: &mut Transform) -> bool {
        let area = self.print_area;
        let bb = transform.bounding_box();
        if !area.is_valid() || !bb.left.is_finite() || !bb.top.is_finite() {
            return false;
        }
        let overlap = self.config.recovery_overlap;
        let dx = if bb.overlaps_x(&area) {
            0.0
        } else {
            escape_correction(bb.left, bb.right(), area.left, area.right(), overlap)
        };
        let dy = if bb.overlaps_y(&area) {
            0.0
        } else {
            escape_correction(bb.top, bb.bottom(), area.top, area.bottom(), overlap)
        };
        if dx.abs() <= 0.0 && dy.abs() <= 0.0 {
            return false;
        }
        debug!("object escaped print area; correcting by ({dx}, {dy})");
        transform.translate(dx, dy);
        true
    }
}

/// Offset that brings span `[lo, hi]` back over `[area_lo, area_hi]` by `overlap`,
/// clamped to the span's and the area's own extent.
fn escape_correction(lo: f64, hi: f64, area_lo: f64, area_hi: f64, overlap: f64) -> f64 {
    let sliver = overlap.min(hi - lo).min(area_hi - area_lo).max(0.0);
    if hi <= area_lo {
        area_lo + sliver - hi
    } else if lo >= area_hi {
        area_hi - sliver - lo
    } else {
        0.0
    }
}
