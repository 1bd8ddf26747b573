use uuid::Uuid;

use super::*;

fn place(doc: &mut DocStore, center: Point, w: f64, h: f64, z: i64) -> ObjectId {
    let id = Uuid::new_v4();
    doc.insert(DesignObject {
        id,
        source: String::new(),
        transform: Transform::new(center, w, h),
        z_index: z,
    });
    id
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

// =============================================================
// Bodies
// =============================================================

#[test]
fn empty_doc_hits_nothing() {
    assert!(hit_test(pt(0.0, 0.0), &DocStore::new(), &Camera::default(), None).is_none());
}

#[test]
fn point_inside_body_hits() {
    let mut doc = DocStore::new();
    let id = place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    let hit = hit_test(pt(110.0, 90.0), &doc, &Camera::default(), None).unwrap();
    assert_eq!(hit, Hit { object_id: id, part: HitPart::Body });
}

#[test]
fn point_outside_body_misses() {
    let mut doc = DocStore::new();
    place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    assert!(hit_test(pt(130.0, 100.0), &doc, &Camera::default(), None).is_none());
}

#[test]
fn topmost_body_wins() {
    let mut doc = DocStore::new();
    place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    let top = place(&mut doc, pt(110.0, 110.0), 50.0, 50.0, 1);
    assert_eq!(hit_test(pt(105.0, 105.0), &doc, &Camera::default(), None).unwrap().object_id, top);
}

#[test]
fn rotated_body_uses_object_frame() {
    let mut doc = DocStore::new();
    let id = place(&mut doc, pt(0.0, 0.0), 100.0, 10.0, 0);
    doc.get_mut(&id).unwrap().transform.set_rotation_deg(90.0);
    // Long axis is now vertical.
    assert!(hit_test(pt(0.0, 40.0), &doc, &Camera::default(), None).is_some());
    assert!(hit_test(pt(40.0, 0.0), &doc, &Camera::default(), None).is_none());
}

#[test]
fn non_finite_point_hits_nothing() {
    let mut doc = DocStore::new();
    place(&mut doc, pt(0.0, 0.0), 100.0, 100.0, 0);
    assert!(hit_test(pt(f64::NAN, 0.0), &doc, &Camera::default(), None).is_none());
}

// =============================================================
// Handles
// =============================================================

#[test]
fn handles_only_for_selected_object() {
    let mut doc = DocStore::new();
    let id = place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    let corner = pt(125.0, 125.0);
    assert_eq!(hit_test(corner, &doc, &Camera::default(), None).unwrap().part, HitPart::Body);
    assert_eq!(
        hit_test(corner, &doc, &Camera::default(), Some(id)).unwrap().part,
        HitPart::ScaleHandle(Corner::LowerRight)
    );
}

#[test]
fn rotate_handle_sits_above_top_edge() {
    let mut doc = DocStore::new();
    let id = place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    let cam = Camera::default();
    let handle = rotate_handle_point(&doc.get(&id).unwrap().transform, &cam);
    assert_eq!(handle, pt(100.0, 75.0 - ROTATE_HANDLE_OFFSET_PX));
    assert_eq!(hit_test(handle, &doc, &cam, Some(id)).unwrap().part, HitPart::RotateHandle);
}

#[test]
fn handle_radius_is_screen_sized() {
    let mut doc = DocStore::new();
    let id = place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    let zoomed = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.0 };
    // 6 canvas units off the corner: within 12px at zoom 1, outside at zoom 4.
    let near = pt(131.0, 125.0);
    assert!(matches!(
        hit_test(near, &doc, &Camera::default(), Some(id)).map(|h| h.part),
        Some(HitPart::ScaleHandle(Corner::LowerRight))
    ));
    assert!(hit_test(near, &doc, &zoomed, Some(id)).is_none());
}

#[test]
fn selected_handle_beats_body_above_it() {
    let mut doc = DocStore::new();
    let below = place(&mut doc, pt(100.0, 100.0), 50.0, 50.0, 0);
    place(&mut doc, pt(125.0, 125.0), 30.0, 30.0, 1);
    let hit = hit_test(pt(125.0, 125.0), &doc, &Camera::default(), Some(below)).unwrap();
    assert_eq!(hit.object_id, below);
    assert_eq!(hit.part, HitPart::ScaleHandle(Corner::LowerRight));
}
