//! Degree math shared by rotation gestures and rotation snapping.

#[cfg(test)]
#[path = "angle_test.rs"]
mod angle_test;

use crate::consts::CARDINAL_ANGLES_DEG;

/// Wrap any angle into `[0, 360)`.
#[must_use]
pub fn normalize_degrees_360(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Shortest signed rotation from `start` to `current`, in `(-180, 180]`.
///
/// Returns 0.0 for non-finite input.
#[must_use]
pub fn signed_angle_delta_deg(current: f64, start: f64) -> f64 {
    let delta = current - start;
    if !delta.is_finite() {
        return 0.0;
    }
    let mut wrapped = delta.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped -= 360.0;
    }
    wrapped
}

/// Unsigned shortest distance between two angles, in `[0, 180]`.
#[must_use]
pub fn angular_delta_deg(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs().rem_euclid(360.0);
    delta.min(360.0 - delta)
}

/// The cardinal angle within `threshold_deg` (inclusive) of `deg`, if any.
#[must_use]
pub fn nearest_cardinal_within(deg: f64, threshold_deg: f64) -> Option<f64> {
    let deg = normalize_degrees_360(deg);
    CARDINAL_ANGLES_DEG
        .into_iter()
        .find(|target| angular_delta_deg(deg, *target) <= threshold_deg)
}
