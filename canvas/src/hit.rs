//! Hit-testing: which object, and which part of it, sits under a canvas point.
//!
//! Handles are sized in screen pixels so they stay grabbable at any zoom; the
//! camera converts that radius into canvas units. Bodies are tested in each
//! object's own rotated frame.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Camera, Point};
use crate::consts::{HANDLE_RADIUS_PX, ROTATE_HANDLE_OFFSET_PX};
use crate::doc::{DesignObject, DocStore, ObjectId};
use crate::transform::Transform;

/// Which part of an object was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ScaleHandle(Corner),
    RotateHandle,
}

/// Corner of an object, in the object's own (rotated) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    UpperLeft,
    UpperRight,
    LowerRight,
    LowerLeft,
}

impl Corner {
    /// Same order as [`Transform::corners`].
    pub const ALL: [Corner; 4] = [Corner::UpperLeft, Corner::UpperRight, Corner::LowerRight, Corner::LowerLeft];
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub object_id: ObjectId,
    pub part: HitPart,
}

/// Canvas position of the rotate handle: above the top edge, in the object's frame.
#[must_use]
pub fn rotate_handle_point(transform: &Transform, camera: &Camera) -> Point {
    let (_, h) = transform.scaled_size();
    let offset = camera.screen_dist_to_canvas(ROTATE_HANDLE_OFFSET_PX);
    transform.to_canvas(Point::new(0.0, -h / 2.0 - offset))
}

/// Test which object (if any) is under `canvas_pt`.
///
/// The selected object's handles win over everything; then bodies are tested
/// topmost first.
#[must_use]
pub fn hit_test(canvas_pt: Point, doc: &DocStore, camera: &Camera, selected_id: Option<ObjectId>) -> Option<Hit> {
    if !canvas_pt.is_finite() {
        return None;
    }
    let radius = camera.screen_dist_to_canvas(HANDLE_RADIUS_PX);

    if let Some(obj) = selected_id.and_then(|id| doc.get(&id)) {
        if let Some(part) = handle_at(canvas_pt, &obj.transform, camera, radius) {
            return Some(Hit { object_id: obj.id, part });
        }
    }

    doc.sorted_objects()
        .into_iter()
        .rev()
        .find(|obj| body_contains(obj, canvas_pt))
        .map(|obj| Hit { object_id: obj.id, part: HitPart::Body })
}

fn handle_at(pt: Point, transform: &Transform, camera: &Camera, radius: f64) -> Option<HitPart> {
    if pt.distance_to(rotate_handle_point(transform, camera)) <= radius {
        return Some(HitPart::RotateHandle);
    }
    Corner::ALL
        .into_iter()
        .zip(transform.corners())
        .find(|(_, corner_pt)| pt.distance_to(*corner_pt) <= radius)
        .map(|(corner, _)| HitPart::ScaleHandle(corner))
}

fn body_contains(obj: &DesignObject, pt: Point) -> bool {
    let (w, h) = obj.transform.scaled_size();
    let local = obj.transform.to_local(pt);
    local.x.abs() <= w / 2.0 && local.y.abs() <= h / 2.0
}
