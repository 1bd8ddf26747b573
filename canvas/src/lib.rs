//! Canvas alignment engine for the phone-case design editor.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns the
//! interactive side of the editor: turning raw pointer events into move,
//! rotate, and scale gestures, snapping the object being manipulated onto the
//! print-area centerlines, edges, and cardinal angles, and reporting guide
//! state for the host to draw. The host JavaScript layer wires DOM events to
//! the engine, draws the scene, and forwards the resulting [`engine::Action`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`align`] | Snapping with hysteresis, lock state, gesture-end recovery |
//! | [`transform`] | Object transform model and axis-aligned rectangles |
//! | [`doc`] | In-memory store of placed images |
//! | [`input`] | Mouse buttons and the gesture state machine |
//! | [`hit`] | Hit-testing bodies and handles |
//! | [`pointer`] | Last known pointer position in canvas space |
//! | [`camera`] | Points and the screen/canvas mapping |
//! | [`angle`] | Degree normalization and cardinal-angle lookup |
//! | [`consts`] | Thresholds and other shared constants |

pub mod align;
pub mod angle;
pub mod camera;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod hit;
pub mod input;
pub mod pointer;
pub mod transform;
