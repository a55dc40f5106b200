//! Applies recognised gestures to the canvas store.

use super::Gesture;
use crate::elements::{ElementId, ImageElement, ImageUpdate};
use crate::store::CanvasStore;
use kurbo::{Point, Vec2};

/// Smallest width or height a pinch can shrink an image to.
pub const MIN_IMAGE_SIZE: f64 = 10.0;

/// Topmost image under a screen-space point.
pub fn find_image_at_position(store: &CanvasStore, screen_point: Point) -> Option<&ImageElement> {
    let canvas_point = store.camera().screen_to_canvas(screen_point);
    store.image_at(canvas_point)
}

#[derive(Debug, Clone, PartialEq)]
enum PanTarget {
    Image { id: ElementId, start: Point },
    Camera { start_offset: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
enum PinchTarget {
    Image {
        id: ElementId,
        width: f64,
        height: f64,
        rotation: f64,
    },
    Camera { start_zoom: f64 },
}

/// Routes gestures to the selected image, or to the camera when nothing is
/// selected.
#[derive(Debug, Clone, Default)]
pub struct GestureController {
    pan: Option<PanTarget>,
    pinch: Option<PinchTarget>,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pan or pinch is being applied.
    pub fn is_manipulating(&self) -> bool {
        self.pan.is_some() || self.pinch.is_some()
    }

    pub fn handle(&mut self, store: &mut CanvasStore, gesture: Gesture) {
        match gesture {
            Gesture::Tap { position } => {
                let hit = find_image_at_position(store, position).map(|img| img.id.clone());
                store.set_selected_image_id(hit);
            }
            Gesture::PanStart { .. } => {
                self.pan = Some(match store.selected_image() {
                    Some(img) => PanTarget::Image {
                        id: img.id.clone(),
                        start: Point::new(img.x, img.y),
                    },
                    None => PanTarget::Camera {
                        start_offset: store.camera().offset,
                    },
                });
            }
            Gesture::PanUpdate { translation } => self.apply_pan(store, translation),
            Gesture::PanEnd { translation } => {
                self.apply_pan(store, translation);
                self.pan = None;
            }
            Gesture::PinchStart { .. } => {
                self.pinch = Some(match store.selected_image() {
                    Some(img) => PinchTarget::Image {
                        id: img.id.clone(),
                        width: img.width,
                        height: img.height,
                        rotation: img.rotation,
                    },
                    None => PinchTarget::Camera {
                        start_zoom: store.camera().zoom,
                    },
                });
            }
            Gesture::PinchUpdate {
                scale,
                rotation,
                focal,
            } => self.apply_pinch(store, scale, rotation, Some(focal)),
            Gesture::PinchEnd { scale, rotation } => {
                self.apply_pinch(store, scale, rotation, None);
                self.pinch = None;
            }
        }
    }

    fn apply_pan(&self, store: &mut CanvasStore, translation: Vec2) {
        match &self.pan {
            Some(PanTarget::Image { id, start }) => {
                let delta = translation / store.camera().zoom;
                let update = ImageUpdate::position(start.x + delta.x, start.y + delta.y);
                store.update_image(id, &update);
            }
            Some(PanTarget::Camera { start_offset }) => {
                store.camera_mut().offset = *start_offset + translation;
            }
            None => {}
        }
    }

    fn apply_pinch(
        &self,
        store: &mut CanvasStore,
        scale: f64,
        rotation: f64,
        focal: Option<Point>,
    ) {
        match &self.pinch {
            Some(PinchTarget::Image {
                id,
                width,
                height,
                rotation: start_rotation,
            }) => {
                // keep aspect ratio when clamping the smaller side
                let min_scale = MIN_IMAGE_SIZE / width.min(*height).max(f64::EPSILON);
                let scale = scale.max(min_scale);
                let update = ImageUpdate {
                    width: Some(width * scale),
                    height: Some(height * scale),
                    rotation: Some(start_rotation + rotation),
                    ..ImageUpdate::default()
                };
                store.update_image(id, &update);
            }
            Some(PinchTarget::Camera { start_zoom }) => {
                if !store.sketch().options().zoomable {
                    return;
                }
                let Some(focal) = focal else {
                    return;
                };
                let factor = start_zoom * scale / store.camera().zoom;
                store.camera_mut().zoom_at(focal, factor);
            }
            None => {}
        }
    }
}
