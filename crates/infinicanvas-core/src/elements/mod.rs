//! Element definitions for the canvas.

mod connector;
mod drawing;
mod group;
mod image;

pub use connector::ConnectorElement;
pub use drawing::{DrawingElement, DrawnPath};
pub use group::GroupElement;
pub use image::{DEFAULT_IMAGE_SIZE, ImageElement, ImageUpdate};

use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Unique identifier for elements.
pub type ElementId = String;

/// Parse a `#rgb`, `#rrggbb` or `#rrggbbaa` colour string.
///
/// Falls back to opaque black for anything it does not understand.
pub fn parse_hex_color(color: &str) -> Color {
    let hex = color.trim().trim_start_matches('#');
    let expanded: String = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect()
    } else {
        hex.to_string()
    };
    let channel = |i: usize| {
        expanded
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match expanded.len() {
        6 | 8 => {
            let alpha = if expanded.len() == 8 { channel(6) } else { Some(255) };
            match (channel(0), channel(2), channel(4), alpha) {
                (Some(r), Some(g), Some(b), Some(a)) => Color::from_rgba8(r, g, b, a),
                _ => Color::from_rgba8(0, 0, 0, 255),
            }
        }
        _ => Color::from_rgba8(0, 0, 0, 255),
    }
}

/// Common trait for all canvas elements.
pub trait ElementTrait {
    /// Get the unique identifier.
    fn id(&self) -> &str;

    /// Get the draw/interaction ordering key.
    fn z_index(&self) -> i64;

    /// Replace the ordering key.
    fn set_z_index(&mut self, z_index: i64);

    /// Top-left anchor position in canvas coordinates.
    fn position(&self) -> Point;

    /// Get the bounding box in canvas coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in canvas coordinates) hits this element.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Move the element by a delta in canvas coordinates.
    fn translate(&mut self, delta: Vec2);
}

/// Kind tag of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Image,
    Drawing,
    Connector,
    Group,
}

/// Enum wrapper for all element types (for serialization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CanvasElement {
    Image(ImageElement),
    Drawing(DrawingElement),
    Connector(ConnectorElement),
    Group(GroupElement),
}

impl CanvasElement {
    fn inner(&self) -> &dyn ElementTrait {
        match self {
            CanvasElement::Image(e) => e,
            CanvasElement::Drawing(e) => e,
            CanvasElement::Connector(e) => e,
            CanvasElement::Group(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ElementTrait {
        match self {
            CanvasElement::Image(e) => e,
            CanvasElement::Drawing(e) => e,
            CanvasElement::Connector(e) => e,
            CanvasElement::Group(e) => e,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            CanvasElement::Image(_) => ElementKind::Image,
            CanvasElement::Drawing(_) => ElementKind::Drawing,
            CanvasElement::Connector(_) => ElementKind::Connector,
            CanvasElement::Group(_) => ElementKind::Group,
        }
    }

    pub fn id(&self) -> &str {
        self.inner().id()
    }

    pub fn z_index(&self) -> i64 {
        self.inner().z_index()
    }

    pub fn set_z_index(&mut self, z_index: i64) {
        self.inner_mut().set_z_index(z_index);
    }

    pub fn position(&self) -> Point {
        self.inner().position()
    }

    pub fn bounds(&self) -> Rect {
        self.inner().bounds()
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.inner().hit_test(point, tolerance)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.inner_mut().translate(delta);
    }

    /// Get the image if this element is an image.
    pub fn as_image(&self) -> Option<&ImageElement> {
        match self {
            CanvasElement::Image(img) => Some(img),
            _ => None,
        }
    }

    /// Get the mutable image if this element is an image.
    pub fn as_image_mut(&mut self) -> Option<&mut ImageElement> {
        match self {
            CanvasElement::Image(img) => Some(img),
            _ => None,
        }
    }

    /// Get the group if this element is a group.
    pub fn as_group(&self) -> Option<&GroupElement> {
        match self {
            CanvasElement::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Get the mutable group if this element is a group.
    pub fn as_group_mut(&mut self) -> Option<&mut GroupElement> {
        match self {
            CanvasElement::Group(g) => Some(g),
            _ => None,
        }
    }
}

impl From<ImageElement> for CanvasElement {
    fn from(image: ImageElement) -> Self {
        CanvasElement::Image(image)
    }
}
