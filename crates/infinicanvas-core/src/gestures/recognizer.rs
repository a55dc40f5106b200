//! Turns touch events into taps, pans and pinch/rotation gestures.
//!
//! Tap is exclusive with the continuous gestures: once a pointer travels past
//! the slop it can no longer tap. Pinch and rotation are reported together
//! from the same two pointers, and a second pointer arriving during a pan
//! hands over from pan to pinch.

use super::{Gesture, PointerId, TouchEvent};
use crate::geometry::calculate_distance;
use kurbo::{Point, Vec2};
use std::f64::consts::{PI, TAU};

/// Longest press that still counts as a tap.
pub const TAP_MAX_DURATION_MS: u64 = 250;
/// Movement in screen pixels a pointer may make before it stops being a tap.
pub const TOUCH_SLOP: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
struct ActivePointer {
    id: PointerId,
    start: Point,
    position: Point,
    down_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// One pointer down, still within slop.
    Pending,
    Panning {
        origin: Point,
        translation: Vec2,
    },
    Pinching {
        start_distance: f64,
        start_angle: f64,
        scale: f64,
        rotation: f64,
    },
    /// A pinch ended while a pointer is still down; wait for release.
    Finished,
}

/// Gesture recognition state machine.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    pointers: Vec<ActivePointer>,
    phase: Phase,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self {
            pointers: Vec::with_capacity(2),
            phase: Phase::Idle,
        }
    }

    /// Number of pointers currently tracked.
    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    /// Whether a pan or pinch is in progress.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Panning { .. } | Phase::Pinching { .. })
    }

    /// Feed one event and collect the gestures it produces.
    pub fn handle_event(&mut self, event: TouchEvent) -> Vec<Gesture> {
        let mut out = Vec::new();
        match event {
            TouchEvent::Down {
                pointer,
                position,
                time_ms,
            } => self.pointer_down(pointer, position, time_ms, &mut out),
            TouchEvent::Move {
                pointer, position, ..
            } => self.pointer_move(pointer, position, &mut out),
            TouchEvent::Up {
                pointer,
                position,
                time_ms,
            } => self.pointer_up(pointer, Some((position, time_ms)), &mut out),
            TouchEvent::Cancel { pointer, .. } => self.pointer_up(pointer, None, &mut out),
        }
        out
    }

    fn pointer_down(
        &mut self,
        id: PointerId,
        position: Point,
        time_ms: u64,
        out: &mut Vec<Gesture>,
    ) {
        if self.pointers.len() >= 2 || self.pointers.iter().any(|p| p.id == id) {
            return;
        }
        self.pointers.push(ActivePointer {
            id,
            start: position,
            position,
            down_at: time_ms,
        });

        if self.pointers.len() == 1 {
            self.phase = Phase::Pending;
            return;
        }

        if let Phase::Panning { translation, .. } = self.phase {
            out.push(Gesture::PanEnd { translation });
        }
        let (a, b) = (self.pointers[0].position, self.pointers[1].position);
        self.phase = Phase::Pinching {
            start_distance: calculate_distance(a, b),
            start_angle: angle_between(a, b),
            scale: 1.0,
            rotation: 0.0,
        };
        out.push(Gesture::PinchStart {
            focal: a.midpoint(b),
        });
    }

    fn pointer_move(&mut self, id: PointerId, position: Point, out: &mut Vec<Gesture>) {
        let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == id) else {
            return;
        };
        pointer.position = position;
        let start = pointer.start;

        if self.phase == Phase::Pending {
            if calculate_distance(start, position) > TOUCH_SLOP {
                let translation = position - start;
                self.phase = Phase::Panning {
                    origin: start,
                    translation,
                };
                out.push(Gesture::PanStart { position: start });
                out.push(Gesture::PanUpdate { translation });
            }
            return;
        }

        match &mut self.phase {
            Phase::Panning {
                origin,
                translation,
            } => {
                *translation = position - *origin;
                out.push(Gesture::PanUpdate {
                    translation: *translation,
                });
            }
            Phase::Pinching {
                start_distance,
                start_angle,
                scale,
                rotation,
            } => {
                let (a, b) = (self.pointers[0].position, self.pointers[1].position);
                if *start_distance > f64::EPSILON {
                    *scale = calculate_distance(a, b) / *start_distance;
                }
                *rotation = normalize_angle(angle_between(a, b) - *start_angle);
                out.push(Gesture::PinchUpdate {
                    scale: *scale,
                    rotation: *rotation,
                    focal: a.midpoint(b),
                });
            }
            Phase::Idle | Phase::Pending | Phase::Finished => {}
        }
    }

    /// Release a pointer. `release` is `None` for a cancelled touch.
    fn pointer_up(&mut self, id: PointerId, release: Option<(Point, u64)>, out: &mut Vec<Gesture>) {
        let Some(index) = self.pointers.iter().position(|p| p.id == id) else {
            return;
        };
        let pointer = self.pointers.remove(index);

        match self.phase {
            Phase::Pending => {
                if let Some((position, time_ms)) = release {
                    let held = time_ms.saturating_sub(pointer.down_at);
                    if held <= TAP_MAX_DURATION_MS
                        && calculate_distance(pointer.start, position) <= TOUCH_SLOP
                    {
                        out.push(Gesture::Tap { position });
                    }
                }
            }
            Phase::Panning { translation, .. } => {
                out.push(Gesture::PanEnd { translation });
            }
            Phase::Pinching {
                scale, rotation, ..
            } => {
                out.push(Gesture::PinchEnd { scale, rotation });
            }
            Phase::Idle | Phase::Finished => {}
        }

        self.phase = if self.pointers.is_empty() {
            Phase::Idle
        } else {
            Phase::Finished
        };
    }
}

fn angle_between(a: Point, b: Point) -> f64 {
    (b.y - a.y).atan2(b.x - a.x)
}

/// Wrap an angle into (-PI, PI].
fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}
