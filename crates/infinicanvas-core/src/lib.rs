//! Infinicanvas Core Library
//!
//! Platform-agnostic data model and logic for the Infinicanvas drawing board:
//! placed images and freehand strokes on a pannable, zoomable canvas, with
//! gesture handling, layer ordering and local persistence.

pub mod camera;
pub mod controls;
pub mod elements;
pub mod geometry;
pub mod gestures;
pub mod images;
pub mod layers;
pub mod sketch;
pub mod state;
pub mod storage;
pub mod store;

pub use camera::Camera;
pub use controls::{ActionOutcome, ToolbarAction, apply_action};
pub use elements::{CanvasElement, ElementId, ImageElement, ImageUpdate};
pub use gestures::{Gesture, GestureController, GestureRecognizer, TouchEvent};
pub use images::{ImageError, ImageManager, ImagePicker, Platform};
pub use layers::{LayerEntry, image_label, layer_entries};
pub use sketch::{CanvasOptions, Sketch};
pub use state::{CanvasAction, CanvasState, StateError};
pub use store::CanvasStore;
