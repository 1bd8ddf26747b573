//! Input model: mouse buttons, gesture kinds, and the gesture state machine.
//!
//! `InputState` is the active gesture tracked between pointer-down and
//! pointer-up. Each active variant owns the context captured at gesture start
//! and, for snapping gestures, the gesture's [`GestureLockState`]. Only one
//! variant can be live at a time, so translation snapping never runs during a
//! rotate or scale and vice versa.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::align::{GestureLockState, LockIndicators, MoveGesture, RotateGesture, ScaleGesture};
use crate::doc::ObjectId;

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger touch).
    Primary,
    Middle,
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` code. Unknown codes are treated as secondary.
    #[must_use]
    pub fn from_dom(code: i16) -> Self {
        match code {
            0 => Self::Primary,
            1 => Self::Middle,
            _ => Self::Secondary,
        }
    }
}

/// The kind of gesture a host can start explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Move,
    Rotate,
    Scale,
}

/// Persistent UI state visible to the host.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// The id of the currently selected object, if any.
    pub selected_id: Option<ObjectId>,
    /// Last cursor reported to the host.
    pub cursor: &'static str,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Dragging an object; translation snapping is active.
    Moving { id: ObjectId, gesture: MoveGesture, locks: GestureLockState },
    /// Rotating an object around its center; rotation snapping is active.
    Rotating { id: ObjectId, gesture: RotateGesture, locks: GestureLockState },
    /// Scaling an object from a corner handle or a pinch. No snapping.
    Scaling { id: ObjectId, gesture: ScaleGesture },
}

impl InputState {
    /// The object under the active gesture.
    #[must_use]
    pub fn active_id(&self) -> Option<ObjectId> {
        match self {
            Self::Idle => None,
            Self::Moving { id, .. } | Self::Rotating { id, .. } | Self::Scaling { id, .. } => Some(*id),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<GestureKind> {
        match self {
            Self::Idle => None,
            Self::Moving { .. } => Some(GestureKind::Move),
            Self::Rotating { .. } => Some(GestureKind::Rotate),
            Self::Scaling { .. } => Some(GestureKind::Scale),
        }
    }

    /// Guide state of the active gesture; all false when idle or scaling.
    #[must_use]
    pub fn indicators(&self) -> LockIndicators {
        match self {
            Self::Moving { locks, .. } | Self::Rotating { locks, .. } => locks.indicators(),
            Self::Idle | Self::Scaling { .. } => LockIndicators::default(),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}
