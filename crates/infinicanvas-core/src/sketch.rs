//! Freehand stroke layer drawn underneath the placed images.

use crate::camera::{MAX_ZOOM, MIN_ZOOM};
use crate::elements::{DrawingElement, DrawnPath};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Tolerance passed to path simplification when a stroke is committed.
pub const STROKE_SIMPLIFY_TOLERANCE: f64 = 0.5;

/// Maximum number of undone strokes kept for redo.
const MAX_REDO_HISTORY: usize = 100;

/// Drawing defaults for the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasOptions {
    pub stroke_color: String,
    pub stroke_width: f64,
    pub background_color: String,
    pub zoomable: bool,
    pub zoom_range: (f64, f64),
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            stroke_color: "#000000".to_string(),
            stroke_width: 2.0,
            background_color: "#FFFFFF".to_string(),
            zoomable: true,
            zoom_range: (MIN_ZOOM, MAX_ZOOM),
        }
    }
}

/// Committed freehand strokes plus the one in progress.
#[derive(Debug, Clone, Default)]
pub struct Sketch {
    options: CanvasOptions,
    strokes: Vec<DrawnPath>,
    redo_stack: Vec<DrawnPath>,
    current: Option<DrawnPath>,
}

impl Sketch {
    pub fn new(options: CanvasOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &CanvasOptions {
        &self.options
    }

    /// Change the colour used by strokes started from now on.
    pub fn set_stroke_color(&mut self, color: impl Into<String>) {
        self.options.stroke_color = color.into();
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        if width > 0.0 {
            self.options.stroke_width = width;
        }
    }

    /// Start a stroke, discarding any stroke still in progress.
    pub fn begin_stroke(&mut self, point: Point) {
        let mut path = DrawnPath::new(self.options.stroke_color.clone(), self.options.stroke_width);
        path.add_point(point);
        self.current = Some(path);
    }

    /// Append a point to the stroke in progress.
    pub fn extend_stroke(&mut self, point: Point) {
        if let Some(path) = &mut self.current {
            path.add_point(point);
        }
    }

    /// Commit the stroke in progress. Returns true if a stroke was added.
    pub fn end_stroke(&mut self) -> bool {
        let Some(mut path) = self.current.take() else {
            return false;
        };
        if path.is_empty() {
            return false;
        }
        path.simplify(STROKE_SIMPLIFY_TOLERANCE);
        self.strokes.push(path);
        self.redo_stack.clear();
        true
    }

    pub fn cancel_stroke(&mut self) {
        self.current = None;
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    /// The stroke being drawn, if any.
    pub fn current_stroke(&self) -> Option<&DrawnPath> {
        self.current.as_ref()
    }

    /// Remove the last committed stroke. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        match self.strokes.pop() {
            Some(path) => {
                self.redo_stack.push(path);
                if self.redo_stack.len() > MAX_REDO_HISTORY {
                    self.redo_stack.remove(0);
                }
                true
            }
            None => false,
        }
    }

    /// Restore the last undone stroke. Returns false if there was none.
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(path) => {
                self.strokes.push(path);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.strokes.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear every stroke and the redo history.
    pub fn reset(&mut self) {
        self.strokes.clear();
        self.redo_stack.clear();
        self.current = None;
    }

    pub fn strokes(&self) -> &[DrawnPath] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Replace the committed strokes, dropping history.
    pub fn set_strokes(&mut self, strokes: Vec<DrawnPath>) {
        self.strokes = strokes.into_iter().filter(|p| !p.is_empty()).collect();
        self.redo_stack.clear();
        self.current = None;
    }

    /// Bounding box of the committed strokes, `None` when empty.
    pub fn bounds(&self) -> Option<Rect> {
        self.strokes
            .iter()
            .filter(|p| !p.is_empty())
            .map(DrawnPath::bounds)
            .reduce(|a, b| a.union(b))
    }

    /// Package the strokes as a single drawing element.
    pub fn to_element(&self, id: impl Into<String>) -> Option<DrawingElement> {
        if self.strokes.is_empty() {
            return None;
        }
        Some(DrawingElement::from_paths(
            id,
            self.strokes.clone(),
            self.options.stroke_color.clone(),
            self.options.stroke_width,
        ))
    }
}
