//! Touch gesture recognition and the canvas manipulations driven by it.

mod controller;
mod recognizer;

pub use controller::{GestureController, MIN_IMAGE_SIZE, find_image_at_position};
pub use recognizer::{GestureRecognizer, TAP_MAX_DURATION_MS, TOUCH_SLOP};

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Identifier of a touch point, stable between its down and up events.
pub type PointerId = u64;

/// Raw touch/pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TouchEvent {
    Down {
        pointer: PointerId,
        position: Point,
        time_ms: u64,
    },
    Move {
        pointer: PointerId,
        position: Point,
        time_ms: u64,
    },
    Up {
        pointer: PointerId,
        position: Point,
        time_ms: u64,
    },
    Cancel {
        pointer: PointerId,
        time_ms: u64,
    },
}

impl TouchEvent {
    pub fn pointer(&self) -> PointerId {
        match *self {
            TouchEvent::Down { pointer, .. }
            | TouchEvent::Move { pointer, .. }
            | TouchEvent::Up { pointer, .. }
            | TouchEvent::Cancel { pointer, .. } => pointer,
        }
    }
}

/// A recognised gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gesture {
    /// Quick single-finger touch.
    Tap { position: Point },
    PanStart { position: Point },
    /// Translation is measured from the pan start, in screen pixels.
    PanUpdate { translation: Vec2 },
    PanEnd { translation: Vec2 },
    PinchStart { focal: Point },
    /// Scale is relative to the start distance; rotation is in radians
    /// relative to the start angle.
    PinchUpdate {
        scale: f64,
        rotation: f64,
        focal: Point,
    },
    PinchEnd { scale: f64, rotation: f64 },
}
