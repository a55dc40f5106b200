//! Viewport over the infinite canvas: the screen offset of the canvas origin
//! and the current scale.

use crate::geometry::{canvas_to_screen_coords, screen_to_canvas_coords};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest scale the canvas allows.
pub const MIN_ZOOM: f64 = 0.25;
/// Largest scale the canvas allows.
pub const MAX_ZOOM: f64 = 5.0;

/// Where the canvas sits on screen.
///
/// A canvas point `p` is drawn at `p * zoom + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Screen position of the canvas origin, in pixels.
    pub offset: Vec2,
    /// Canvas scale; 1.0 shows canvas units as pixels.
    pub zoom: f64,
    zoom_range: (f64, f64),
}

impl Default for Camera {
    fn default() -> Self {
        Self::with_zoom_range(MIN_ZOOM, MAX_ZOOM)
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unscaled camera limited to `[min_zoom, max_zoom]`. Bounds given in the
    /// wrong order are swapped.
    pub fn with_zoom_range(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            zoom_range: (min_zoom.min(max_zoom), min_zoom.max(max_zoom)),
        }
    }

    pub fn zoom_range(&self) -> (f64, f64) {
        self.zoom_range
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.zoom_range.0, self.zoom_range.1)
    }

    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        screen_to_canvas_coords(screen, self.offset, self.zoom)
    }

    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        canvas_to_screen_coords(canvas, self.offset, self.zoom)
    }

    /// Slide the canvas by a screen-space delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.clamp_zoom(zoom);
    }

    /// Multiply the scale by `factor` around a screen focal point; the canvas
    /// point under the focal point does not move.
    pub fn zoom_at(&mut self, focal: Point, factor: f64) {
        let zoom = self.clamp_zoom(self.zoom * factor);
        if (zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_canvas(focal);
        self.zoom = zoom;
        self.offset = focal.to_vec2() - anchor.to_vec2() * zoom;
    }

    /// Back to the origin at scale 1.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Centre `bounds` in a viewport of `viewport` pixels, leaving `padding`
    /// pixels on every side. Degenerate bounds reset the view.
    pub fn fit_to_bounds(&mut self, bounds: Rect, viewport: Size, padding: f64) {
        if bounds.is_zero_area() {
            self.reset();
            return;
        }

        let usable_w = (viewport.width - 2.0 * padding).max(1.0);
        let usable_h = (viewport.height - 2.0 * padding).max(1.0);
        self.zoom = self.clamp_zoom((usable_w / bounds.width()).min(usable_h / bounds.height()));

        let centre = bounds.center();
        self.offset = Vec2::new(
            viewport.width / 2.0 - centre.x * self.zoom,
            viewport.height / 2.0 - centre.y * self.zoom,
        );
    }
}
