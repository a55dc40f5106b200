//! Live canvas state shared by gestures, toolbar actions and the image manager.

use crate::camera::Camera;
use crate::elements::{CanvasElement, ElementId, ElementTrait, ImageElement, ImageUpdate};
use crate::geometry::generate_unique_id;
use crate::sketch::{CanvasOptions, Sketch};
use crate::state::{CanvasState, StateError, StateResult};
use kurbo::Point;

/// Images, selection, view and freehand layer of the open canvas.
#[derive(Debug, Clone)]
pub struct CanvasStore {
    images: Vec<ImageElement>,
    selected_image_id: Option<ElementId>,
    camera: Camera,
    sketch: Sketch,
    drawing_id: ElementId,
    drawing_z_index: i64,
    /// Connectors and groups carried through snapshot/restore untouched.
    other_elements: Vec<CanvasElement>,
    revision: u64,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasStore {
    pub fn new() -> Self {
        Self::with_options(CanvasOptions::default())
    }

    /// Create a store whose camera honours the zoom range of `options`.
    pub fn with_options(options: CanvasOptions) -> Self {
        let (min_zoom, max_zoom) = options.zoom_range;
        Self {
            images: Vec::new(),
            selected_image_id: None,
            camera: Camera::with_zoom_range(min_zoom, max_zoom),
            sketch: Sketch::new(options),
            drawing_id: generate_unique_id(),
            drawing_z_index: 0,
            other_elements: Vec::new(),
            revision: 0,
        }
    }

    /// Counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn images(&self) -> &[ImageElement] {
        &self.images
    }

    pub fn image(&self, id: &str) -> Option<&ImageElement> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Images ordered back to front.
    pub fn images_by_z(&self) -> Vec<&ImageElement> {
        let mut sorted: Vec<_> = self.images.iter().collect();
        sorted.sort_by_key(|img| img.z_index);
        sorted
    }

    /// Topmost image under a canvas-space point.
    pub fn image_at(&self, point: Point) -> Option<&ImageElement> {
        self.images
            .iter()
            .filter(|img| img.hit_test(point, 0.0))
            .max_by_key(|img| img.z_index)
    }

    pub fn selected_image_id(&self) -> Option<&str> {
        self.selected_image_id.as_deref()
    }

    pub fn selected_image(&self) -> Option<&ImageElement> {
        self.selected_image_id.as_deref().and_then(|id| self.image(id))
    }

    pub fn set_selected_image_id(&mut self, id: Option<ElementId>) {
        if self.selected_image_id != id {
            self.selected_image_id = id;
            self.touch();
        }
    }

    /// Whether any element on the canvas, including the freehand layer,
    /// already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.image(id).is_some()
            || self.drawing_id == id
            || self.other_elements.iter().any(|el| el.id() == id)
    }

    /// Add an image. Fails if any element already uses its id.
    pub fn add_image(&mut self, image: ImageElement) -> StateResult<()> {
        if self.contains_id(&image.id) {
            return Err(StateError::DuplicateId(image.id));
        }
        log::debug!("Adding image {} at ({}, {})", image.id, image.x, image.y);
        self.images.push(image);
        self.touch();
        Ok(())
    }

    /// Apply a partial update. Unknown ids are ignored.
    pub fn update_image(&mut self, id: &str, update: &ImageUpdate) -> bool {
        let Some(image) = self.images.iter_mut().find(|img| img.id == id) else {
            return false;
        };
        update.apply_to(image);
        self.touch();
        true
    }

    /// Remove an image, clearing the selection if it pointed at it.
    pub fn remove_image(&mut self, id: &str) -> Option<ImageElement> {
        let index = self.images.iter().position(|img| img.id == id)?;
        let removed = self.images.remove(index);
        if self.selected_image_id.as_deref() == Some(id) {
            self.selected_image_id = None;
        }
        self.touch();
        Some(removed)
    }

    /// Move an image above every other image.
    pub fn bring_to_front(&mut self, id: &str) -> bool {
        let max_z = self.images.iter().map(|img| img.z_index).fold(0, i64::max);
        self.set_z_index(id, max_z + 1)
    }

    /// Move an image below every other image.
    pub fn send_to_back(&mut self, id: &str) -> bool {
        let min_z = self.images.iter().map(|img| img.z_index).fold(0, i64::min);
        self.set_z_index(id, min_z - 1)
    }

    fn set_z_index(&mut self, id: &str, z_index: i64) -> bool {
        let update = ImageUpdate {
            z_index: Some(z_index),
            ..ImageUpdate::default()
        };
        self.update_image(id, &update)
    }

    /// Remove every image and stroke and reset the view.
    pub fn clear(&mut self) {
        self.images.clear();
        self.other_elements.clear();
        self.selected_image_id = None;
        self.sketch.reset();
        self.camera.reset();
        self.touch();
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable view access; counts as a mutation.
    pub fn camera_mut(&mut self) -> &mut Camera {
        self.touch();
        &mut self.camera
    }

    pub fn sketch(&self) -> &Sketch {
        &self.sketch
    }

    /// Mutable stroke access; counts as a mutation.
    pub fn sketch_mut(&mut self) -> &mut Sketch {
        self.touch();
        &mut self.sketch
    }

    /// Capture the store as a persistable document.
    pub fn snapshot(&self) -> CanvasState {
        let mut elements: Vec<CanvasElement> = Vec::with_capacity(self.images.len() + 1);
        if let Some(mut drawing) = self.sketch.to_element(self.drawing_id.clone()) {
            drawing.z_index = self.drawing_z_index;
            elements.push(CanvasElement::Drawing(drawing));
        }
        elements.extend(self.images.iter().cloned().map(CanvasElement::Image));
        elements.extend(self.other_elements.iter().cloned());

        CanvasState {
            elements,
            selected_element_ids: self.selected_image_id.iter().cloned().collect(),
            canvas_offset: self.camera.offset,
            scale: self.camera.zoom,
        }
    }

    /// Replace the store contents with a document.
    ///
    /// Drawings are merged into the sketch layer; connectors and groups are
    /// kept as-is for the next snapshot.
    pub fn restore(&mut self, state: CanvasState) -> StateResult<()> {
        state.ensure_unique_ids()?;

        let mut images = Vec::new();
        let mut strokes = Vec::new();
        let mut drawing_id = None;
        let mut drawing_z_index = 0;
        let mut others = Vec::new();
        for element in state.elements {
            match element {
                CanvasElement::Image(image) => images.push(image),
                CanvasElement::Drawing(drawing) => {
                    if drawing_id.is_none() {
                        drawing_id = Some(drawing.id.clone());
                        drawing_z_index = drawing.z_index;
                    }
                    strokes.extend(drawing.paths);
                }
                other => others.push(other),
            }
        }

        self.selected_image_id = state
            .selected_element_ids
            .into_iter()
            .find(|id| images.iter().any(|img| img.id == *id));
        self.images = images;
        self.other_elements = others;
        self.sketch.set_strokes(strokes);
        self.drawing_id = drawing_id.unwrap_or_else(generate_unique_id);
        self.drawing_z_index = drawing_z_index;
        self.camera.offset = state.canvas_offset;
        self.camera.set_zoom(state.scale);
        self.touch();
        Ok(())
    }
}
