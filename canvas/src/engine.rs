//! Engine: pointer events in, transform mutations and host actions out.
//!
//! ARCHITECTURE
//! ============
//! `EngineCore` holds everything that does not touch the DOM: the document,
//! camera, pointer tracker, alignment engine, and gesture state machine. It is
//! driven entirely through method calls and answers with [`Action`]s, so it is
//! tested natively. `Engine` wraps it with the `HtmlCanvasElement` and turns
//! DOM pointer events into core calls.
//!
//! GESTURE FLOW
//! ============
//! pointer-down hit-tests and starts at most one gesture (move, rotate, or
//! scale). Every pointer-move feeds the gesture's alignment step, which
//! rewrites the object's transform in place. pointer-up (or pointer-cancel)
//! ends the gesture: locks are dropped, guides go dark, and an object dragged
//! fully outside the print area is pulled back.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlCanvasElement, PointerEvent};

use crate::align::{
    AlignConfig, AlignmentEngine, GestureLockState, LockIndicators, MoveGesture, RotateGesture, ScaleGesture,
};
use crate::camera::{Camera, Point};
use crate::consts::VIEWPORT_MARGIN_PX;
use crate::doc::{DesignObject, DocStore, ObjectId};
use crate::hit::{self, Corner, HitPart};
use crate::input::{Button, GestureKind, InputState, UiState};
use crate::pointer::PointerTracker;
use crate::transform::{Rect, Transform};

const CURSOR_DEFAULT: &str = "default";
const CURSOR_MOVE: &str = "move";
const CURSOR_ROTATE: &str = "grab";
const CURSOR_ROTATING: &str = "grabbing";
const CURSOR_SCALE_NWSE: &str = "nwse-resize";
const CURSOR_SCALE_NESW: &str = "nesw-resize";

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// An object's transform changed; the host persists or re-renders it.
    ObjectUpdated { id: ObjectId, transform: Transform },
    /// Alignment guides changed; all-false means hide every guide.
    GuidesChanged(LockIndicators),
    SelectionChanged(Option<ObjectId>),
    SetCursor(String),
    RenderNeeded,
}

/// Core engine state: all logic that doesn't depend on the canvas element.
pub struct EngineCore {
    pub doc: DocStore,
    pub camera: Camera,
    pub pointer: PointerTracker,
    pub align: AlignmentEngine,
    pub ui: UiState,
    pub input: InputState,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
    /// Guides last reported to the host.
    guides: LockIndicators,
}

impl EngineCore {
    #[must_use]
    pub fn new(print_area: Rect, config: AlignConfig) -> Self {
        Self {
            doc: DocStore::new(),
            camera: Camera::default(),
            pointer: PointerTracker::new(),
            align: AlignmentEngine::new(print_area, config),
            ui: UiState::default(),
            input: InputState::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
            guides: LockIndicators::default(),
        }
    }

    // --- Viewport / configuration ---

    /// Update viewport dimensions (CSS pixels) and refit the print area into them.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.viewport_width = width_css;
        self.viewport_height = height_css;
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        self.camera = fit_camera(self.align.print_area(), width_css, height_css);
    }

    /// Move or resize the print area. Any active gesture is cancelled.
    pub fn set_print_area(&mut self, print_area: Rect) -> Vec<Action> {
        let mut actions = Vec::new();
        self.cancel_gesture(&mut actions);
        self.align.set_print_area(print_area);
        self.camera = fit_camera(print_area, self.viewport_width, self.viewport_height);
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn set_align_config(&mut self, config: AlignConfig) {
        self.align.set_config(config);
    }

    // --- Document ---

    /// Place a new image fitted to the print area and select it.
    pub fn place_image(&mut self, source: String, width: f64, height: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(id) = self.doc.place_image(source, width, height, self.align.print_area()) else {
            return actions;
        };
        self.select(Some(id), &mut actions);
        self.push_object_updated(id, &mut actions);
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Swap the image behind `id`. A gesture on that object is cancelled.
    pub fn replace_image(&mut self, id: &ObjectId, source: String, width: f64, height: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.input.active_id().as_ref() == Some(id) {
            self.cancel_gesture(&mut actions);
        }
        if self.doc.replace_image(id, source, width, height, self.align.print_area()) {
            self.push_object_updated(*id, &mut actions);
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Remove an object. A gesture on it is cancelled and it is deselected.
    pub fn remove_object(&mut self, id: &ObjectId) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.input.active_id().as_ref() == Some(id) {
            self.cancel_gesture(&mut actions);
        }
        if self.doc.remove(id).is_some() {
            if self.ui.selected_id.as_ref() == Some(id) {
                self.select(None, &mut actions);
            }
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    // --- Input events ---

    /// Pointer pressed at `screen_pt` (CSS pixels relative to the element).
    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button) -> Vec<Action> {
        let Some(canvas_pt) = self.pointer.record_screen(screen_pt, &self.camera) else {
            return Vec::new();
        };
        if button != Button::Primary || !self.input.is_idle() {
            return Vec::new();
        }

        let Some(hit) = hit::hit_test(canvas_pt, &self.doc, &self.camera, self.ui.selected_id) else {
            let mut actions = Vec::new();
            self.select(None, &mut actions);
            return actions;
        };
        let kind = match hit.part {
            HitPart::Body => GestureKind::Move,
            HitPart::RotateHandle => GestureKind::Rotate,
            HitPart::ScaleHandle(_) => GestureKind::Scale,
        };
        self.begin_gesture(hit.object_id, kind, canvas_pt)
    }

    /// Start a gesture on `id` with the pointer at `canvas_pt`.
    ///
    /// Refused (empty actions, state unchanged) while another gesture is
    /// active, for unknown objects, or when the pointer sits on the pivot of
    /// a rotate/scale.
    pub fn begin_gesture(&mut self, id: ObjectId, kind: GestureKind, canvas_pt: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.input.is_idle() || !canvas_pt.is_finite() {
            return actions;
        }
        let Some(obj) = self.doc.get(&id) else {
            return actions;
        };
        let transform = &obj.transform;
        let (state, cursor) = match kind {
            GestureKind::Move => (
                InputState::Moving { id, gesture: MoveGesture::begin(transform, canvas_pt), locks: GestureLockState::new() },
                CURSOR_MOVE,
            ),
            GestureKind::Rotate => {
                let Some(gesture) = RotateGesture::begin(transform, canvas_pt) else {
                    return actions;
                };
                (InputState::Rotating { id, gesture, locks: GestureLockState::new() }, CURSOR_ROTATING)
            }
            GestureKind::Scale => {
                let Some(gesture) = ScaleGesture::begin(transform, canvas_pt) else {
                    return actions;
                };
                let cursor = scale_cursor(transform, canvas_pt);
                (InputState::Scaling { id, gesture }, cursor)
            }
        };

        log::debug!("gesture {kind:?} started on {id}");
        self.input = state;
        self.pointer.record(canvas_pt);
        self.select(Some(id), &mut actions);
        self.set_cursor(cursor, &mut actions);
        actions
    }

    /// Pointer moved. Drives the active gesture, or updates the hover cursor.
    pub fn on_pointer_move(&mut self, screen_pt: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(canvas_pt) = self.pointer.record_screen(screen_pt, &self.camera) else {
            return actions;
        };
        if self.input.is_idle() {
            let cursor = self.hover_cursor(canvas_pt);
            self.set_cursor(cursor, &mut actions);
            return actions;
        }

        match self.step_gesture(canvas_pt) {
            Some((id, true)) => {
                self.push_object_updated(id, &mut actions);
                actions.push(Action::RenderNeeded);
            }
            Some((_, false)) => {}
            None => {
                log::warn!("gesture target vanished; dropping gesture");
                self.cancel_gesture(&mut actions);
            }
        }
        self.sync_guides(&mut actions);
        actions
    }

    /// Pointer released. Ends the active gesture on the primary button.
    pub fn on_pointer_up(&mut self, screen_pt: Point, button: Button) -> Vec<Action> {
        self.pointer.record_screen(screen_pt, &self.camera);
        if button != Button::Primary {
            return Vec::new();
        }
        self.end_gesture()
    }

    /// Host-supplied pinch: `factor` is relative to the scale at pinch start.
    ///
    /// Starts a pinch on the selected object when idle. Ignored during a move
    /// or rotate.
    pub fn on_pinch(&mut self, factor: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.input.is_idle() {
            let Some(obj) = self.ui.selected_id.and_then(|id| self.doc.get(&id)) else {
                return actions;
            };
            self.input = InputState::Scaling { id: obj.id, gesture: ScaleGesture::begin_pinch(&obj.transform) };
        }
        let InputState::Scaling { id, gesture } = &self.input else {
            return actions;
        };
        let (id, gesture) = (*id, *gesture);
        let Some(obj) = self.doc.get_mut(&id) else {
            return actions;
        };
        if self.align.apply_scale_factor(&gesture, &mut obj.transform, factor) {
            self.push_object_updated(id, &mut actions);
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Finish the active gesture: drop its locks, hide the guides, and pull a
    /// fully escaped object back over the print area.
    pub fn end_gesture(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        let (id, mut locks) = match std::mem::take(&mut self.input) {
            InputState::Idle => return actions,
            InputState::Moving { id, locks, .. } | InputState::Rotating { id, locks, .. } => (id, locks),
            InputState::Scaling { id, .. } => (id, GestureLockState::new()),
        };
        if let Some(obj) = self.doc.get_mut(&id) {
            if self.align.end_gesture(&mut locks, &mut obj.transform) {
                log::debug!("object {id} recovered into print area");
            }
            self.push_object_updated(id, &mut actions);
        }
        self.sync_guides(&mut actions);
        let cursor = self.pointer.last().map_or(CURSOR_DEFAULT, |pt| self.hover_cursor(pt));
        self.set_cursor(cursor, &mut actions);
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Queries ---

    /// The currently selected object, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ObjectId> {
        self.ui.selected_id
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn object(&self, id: &ObjectId) -> Option<&DesignObject> {
        self.doc.get(id)
    }

    /// Guides as last reported to the host.
    #[must_use]
    pub fn indicators(&self) -> LockIndicators {
        self.guides
    }

    #[must_use]
    pub fn gesture_kind(&self) -> Option<GestureKind> {
        self.input.kind()
    }

    // --- Internals ---

    /// Run one alignment step. `None` when the gesture's object is gone.
    fn step_gesture(&mut self, pt: Point) -> Option<(ObjectId, bool)> {
        match &mut self.input {
            InputState::Idle => None,
            InputState::Moving { id, gesture, locks } => {
                let obj = self.doc.get_mut(id)?;
                Some((*id, self.align.apply_move(gesture, locks, &mut obj.transform, pt)))
            }
            InputState::Rotating { id, gesture, locks } => {
                let obj = self.doc.get_mut(id)?;
                Some((*id, self.align.apply_rotate(gesture, locks, &mut obj.transform, pt)))
            }
            InputState::Scaling { id, gesture } => {
                let obj = self.doc.get_mut(id)?;
                Some((*id, self.align.apply_scale(gesture, &mut obj.transform, pt)))
            }
        }
    }

    /// Drop the active gesture without any end-of-gesture correction.
    fn cancel_gesture(&mut self, actions: &mut Vec<Action>) {
        if let Some(id) = self.input.active_id() {
            log::debug!("gesture on {id} cancelled");
        }
        self.input = InputState::Idle;
        self.sync_guides(actions);
    }

    fn select(&mut self, id: Option<ObjectId>, actions: &mut Vec<Action>) {
        if self.ui.selected_id != id {
            self.ui.selected_id = id;
            actions.push(Action::SelectionChanged(id));
            actions.push(Action::RenderNeeded);
        }
    }

    fn sync_guides(&mut self, actions: &mut Vec<Action>) {
        let now = self.input.indicators();
        if now != self.guides {
            self.guides = now;
            actions.push(Action::GuidesChanged(now));
        }
    }

    fn set_cursor(&mut self, cursor: &'static str, actions: &mut Vec<Action>) {
        if self.ui.cursor != cursor {
            self.ui.cursor = cursor;
            actions.push(Action::SetCursor(cursor.to_owned()));
        }
    }

    fn push_object_updated(&self, id: ObjectId, actions: &mut Vec<Action>) {
        if let Some(obj) = self.doc.get(&id) {
            actions.push(Action::ObjectUpdated { id, transform: obj.transform });
        }
    }

    fn hover_cursor(&self, pt: Point) -> &'static str {
        match hit::hit_test(pt, &self.doc, &self.camera, self.ui.selected_id) {
            None => CURSOR_DEFAULT,
            Some(hit) => match hit.part {
                HitPart::Body => CURSOR_MOVE,
                HitPart::RotateHandle => CURSOR_ROTATE,
                HitPart::ScaleHandle(Corner::UpperLeft | Corner::LowerRight) => CURSOR_SCALE_NWSE,
                HitPart::ScaleHandle(Corner::UpperRight | Corner::LowerLeft) => CURSOR_SCALE_NESW,
            },
        }
    }
}

fn scale_cursor(transform: &Transform, pt: Point) -> &'static str {
    let local = transform.to_local(pt);
    if (local.x < 0.0) == (local.y < 0.0) { CURSOR_SCALE_NWSE } else { CURSOR_SCALE_NESW }
}

/// Camera that letterboxes `print_area` into the viewport.
fn fit_camera(print_area: Rect, width_css: f64, height_css: f64) -> Camera {
    let cam = Camera::fit(print_area.width, print_area.height, width_css, height_css, VIEWPORT_MARGIN_PX);
    Camera { pan_x: cam.pan_x - print_area.left * cam.zoom, pan_y: cam.pan_y - print_area.top * cam.zoom, ..cam }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    pub core: EngineCore,
}

impl Engine {
    /// Create an engine bound to `canvas` and size it to the element.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, print_area: Rect, config: AlignConfig) -> Self {
        let mut engine = Self { canvas, core: EngineCore::new(print_area, config) };
        engine.sync_viewport();
        engine
    }

    /// Match the backing store to the element's CSS size times the device
    /// pixel ratio, and refit the camera.
    pub fn sync_viewport(&mut self) {
        let dpr = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
        let width_css = f64::from(self.canvas.client_width());
        let height_css = f64::from(self.canvas.client_height());
        self.canvas.set_width(backing_px(width_css, dpr));
        self.canvas.set_height(backing_px(height_css, dpr));
        self.core.set_viewport(width_css, height_css, dpr);
    }

    /// Dispatch a DOM pointer event. Other events produce no actions.
    pub fn handle_event(&mut self, event: &Event) -> Vec<Action> {
        let Some(pe) = event.dyn_ref::<PointerEvent>() else {
            return Vec::new();
        };
        let pt = Point::new(f64::from(pe.offset_x()), f64::from(pe.offset_y()));
        match event.type_().as_str() {
            "pointerdown" => self.core.on_pointer_down(pt, Button::from_dom(pe.button())),
            "pointermove" => self.core.on_pointer_move(pt),
            "pointerup" => self.core.on_pointer_up(pt, Button::from_dom(pe.button())),
            "pointercancel" => self.core.end_gesture(),
            _ => Vec::new(),
        }
    }

    // --- Delegated inputs ---

    pub fn place_image(&mut self, source: String, width: f64, height: f64) -> Vec<Action> {
        self.core.place_image(source, width, height)
    }

    pub fn replace_image(&mut self, id: &ObjectId, source: String, width: f64, height: f64) -> Vec<Action> {
        self.core.replace_image(id, source, width, height)
    }

    pub fn remove_object(&mut self, id: &ObjectId) -> Vec<Action> {
        self.core.remove_object(id)
    }

    pub fn on_pinch(&mut self, factor: f64) -> Vec<Action> {
        self.core.on_pinch(factor)
    }

    // --- Delegated queries ---

    #[must_use]
    pub fn selection(&self) -> Option<ObjectId> {
        self.core.selection()
    }

    #[must_use]
    pub fn indicators(&self) -> LockIndicators {
        self.core.indicators()
    }

    #[must_use]
    pub fn object(&self, id: &ObjectId) -> Option<&DesignObject> {
        self.core.object(id)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn backing_px(css: f64, dpr: f64) -> u32 {
    let px = (css * dpr).round();
    if px.is_finite() && px > 0.0 { px.min(f64::from(u32::MAX)) as u32 } else { 0 }
}
