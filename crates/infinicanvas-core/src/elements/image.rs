//! Placed image element.

use super::{ElementId, ElementTrait};
use crate::geometry::is_point_in_rect;
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Width and height given to an image when it is first placed.
pub const DEFAULT_IMAGE_SIZE: f64 = 200.0;

/// An image placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    pub id: ElementId,
    /// Source reference (file path, remote URL or `data:` URI).
    pub uri: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in radians about the image centre.
    #[serde(default)]
    pub rotation: f64,
    /// Opacity from 0.0 (invisible) to 1.0 (opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    pub z_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

fn default_opacity() -> f64 {
    1.0
}

impl ImageElement {
    /// Create an image with the default size at the given position.
    pub fn new(id: impl Into<ElementId>, uri: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            x,
            y,
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            rotation: 0.0,
            opacity: 1.0,
            z_index: 0,
            selected: None,
        }
    }

    /// Builder: set display dimensions.
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Builder: set the z-index.
    pub fn with_z_index(mut self, z_index: i64) -> Self {
        self.z_index = z_index;
        self
    }

    /// The unrotated rectangle covered by the image.
    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Centre of the image, the pivot for rotation.
    pub fn center(&self) -> Point {
        self.as_rect().center()
    }

    fn rotation_transform(&self) -> Affine {
        Affine::rotate_about(self.rotation, self.center())
    }
}

impl ElementTrait for ImageElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn z_index(&self) -> i64 {
        self.z_index
    }

    fn set_z_index(&mut self, z_index: i64) {
        self.z_index = z_index;
    }

    fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    fn bounds(&self) -> Rect {
        if self.rotation == 0.0 {
            self.as_rect()
        } else {
            self.rotation_transform().transform_rect_bbox(self.as_rect())
        }
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let local = if self.rotation == 0.0 {
            point
        } else {
            self.rotation_transform().inverse() * point
        };
        is_point_in_rect(local, self.as_rect().inflate(tolerance, tolerance))
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }
}

/// Partial update applied by [`crate::store::CanvasStore::update_image`].
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageUpdate {
    pub uri: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub opacity: Option<f64>,
    pub z_index: Option<i64>,
}

impl ImageUpdate {
    /// Update that only moves the image.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Update that only resizes the image.
    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// Update that only rotates the image.
    pub fn rotation(rotation: f64) -> Self {
        Self {
            rotation: Some(rotation),
            ..Self::default()
        }
    }

    /// Apply the set fields to an image.
    pub fn apply_to(&self, image: &mut ImageElement) {
        if let Some(uri) = &self.uri {
            image.uri.clone_from(uri);
        }
        if let Some(x) = self.x {
            image.x = x;
        }
        if let Some(y) = self.y {
            image.y = y;
        }
        if let Some(width) = self.width {
            image.width = width;
        }
        if let Some(height) = self.height {
            image.height = height;
        }
        if let Some(rotation) = self.rotation {
            image.rotation = rotation;
        }
        if let Some(opacity) = self.opacity {
            image.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(z_index) = self.z_index {
            image.z_index = z_index;
        }
    }
}
