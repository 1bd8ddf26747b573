//! Shared numeric constants for the canvas crate.

// ── Translation snapping ────────────────────────────────────────

/// Distance in canvas units within which an object center or edge is pulled
/// onto a guide.
pub const SNAP_THRESHOLD: f64 = 3.0;

/// Pointer travel in canvas units, measured from the lock anchor, needed to
/// break a translation lock.
pub const RELEASE_THRESHOLD: f64 = 10.0;

// ── Rotation snapping ───────────────────────────────────────────

/// Angular distance in degrees within which rotation snaps to a cardinal.
pub const ROTATION_SNAP_DEG: f64 = 3.0;

/// Angular pointer travel in degrees needed to break a rotation lock.
pub const ROTATION_RELEASE_DEG: f64 = 10.0;

/// Rotations the engine snaps to.
pub const CARDINAL_ANGLES_DEG: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

// ── Gesture end ─────────────────────────────────────────────────

/// Overlap in canvas units restored when an object fully escapes the print area.
pub const RECOVERY_OVERLAP: f64 = 10.0;

// ── Geometry guards ─────────────────────────────────────────────

/// Extents at or below this are treated as degenerate and skip snapping.
pub const MIN_EXTENT: f64 = 1e-6;

/// Pointer distances from the pivot below this make angle and scale undefined.
pub const MIN_PIVOT_DISTANCE: f64 = 1e-3;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for handles.
pub const HANDLE_RADIUS_PX: f64 = 12.0;

/// Distance from the bounding box edge to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 28.0;

// ── Viewport ────────────────────────────────────────────────────

/// CSS pixels kept free around the print area when fitting it to the element.
pub const VIEWPORT_MARGIN_PX: f64 = 16.0;
