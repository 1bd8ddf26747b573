//! Document model: design objects placed on the canvas and the in-memory store.
//!
//! A design holds one or more image objects, each carrying its own
//! [`Transform`]. The input engine mutates transforms in place through
//! [`DocStore::get_mut`]; hosts place, replace, and remove objects through the
//! store and read draw order from [`DocStore::sorted_objects`].

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::consts::MIN_EXTENT;
use crate::transform::{Rect, Scale, Transform};

/// Unique identifier for a design object.
pub type ObjectId = Uuid;

/// An image placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignObject {
    pub id: ObjectId,
    /// Image URL or data reference, opaque to the engine.
    pub source: String,
    pub transform: Transform,
    /// Stacking order; lower values are drawn beneath higher values.
    pub z_index: i64,
}

/// Transform that fits an image of intrinsic `width` x `height` inside
/// `print_area`, preserving aspect ratio, centered.
///
/// `None` for degenerate image or area dimensions.
#[must_use]
pub fn fit_transform(print_area: Rect, width: f64, height: f64) -> Option<Transform> {
    if !print_area.is_valid() || !width.is_finite() || !height.is_finite() || width <= MIN_EXTENT || height <= MIN_EXTENT
    {
        return None;
    }
    let factor = (print_area.width / width).min(print_area.height / height);
    let mut transform = Transform::new(print_area.center(), width, height);
    transform.set_scale(Scale::uniform(factor));
    Some(transform)
}

/// In-memory store of design objects.
#[derive(Debug, Default)]
pub struct DocStore {
    objects: HashMap<ObjectId, DesignObject>,
}

impl DocStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an object by `id`.
    pub fn insert(&mut self, obj: DesignObject) {
        self.objects.insert(obj.id, obj);
    }

    /// Place a new image fitted to `print_area` on top of everything else.
    /// Returns the new object's id, or `None` for degenerate dimensions.
    pub fn place_image(&mut self, source: String, width: f64, height: f64, print_area: Rect) -> Option<ObjectId> {
        let transform = fit_transform(print_area, width, height)?;
        let id = Uuid::new_v4();
        let z_index = self.next_z_index();
        self.insert(DesignObject { id, source, transform, z_index });
        Some(id)
    }

    /// Swap the image behind `id`, refitting it to `print_area` while keeping
    /// its rotation and stacking order. Returns false if `id` is unknown or
    /// the new dimensions are degenerate.
    pub fn replace_image(&mut self, id: &ObjectId, source: String, width: f64, height: f64, print_area: Rect) -> bool {
        let Some(mut transform) = fit_transform(print_area, width, height) else {
            return false;
        };
        let Some(obj) = self.objects.get_mut(id) else {
            return false;
        };
        transform.set_rotation_deg(obj.transform.rotation_deg());
        obj.source = source;
        obj.transform = transform;
        true
    }

    /// Remove an object by id, returning it if it was present.
    pub fn remove(&mut self, id: &ObjectId) -> Option<DesignObject> {
        self.objects.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&DesignObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut DesignObject> {
        self.objects.get_mut(id)
    }

    /// All objects sorted by `(z_index, id)` for draw order.
    #[must_use]
    pub fn sorted_objects(&self) -> Vec<&DesignObject> {
        let mut objs: Vec<&DesignObject> = self.objects.values().collect();
        objs.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        objs
    }

    fn next_z_index(&self) -> i64 {
        self.objects.values().map(|o| o.z_index).max().map_or(0, |z| z + 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
