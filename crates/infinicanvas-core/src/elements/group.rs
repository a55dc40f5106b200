//! Group element that binds other elements together.

use super::{ElementId, ElementTrait};
use crate::geometry::is_point_in_rect;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A group referencing member elements by id.
///
/// Members stay in the element list; the group only records which ids move
/// together and the rectangle they covered when grouped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupElement {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    pub z_index: i64,
    pub element_ids: Vec<ElementId>,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl GroupElement {
    /// Create a group covering `rect`.
    pub fn new(id: impl Into<ElementId>, element_ids: Vec<ElementId>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            x: rect.x0,
            y: rect.y0,
            z_index: 0,
            element_ids,
            width: rect.width(),
            height: rect.height(),
            selected: None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.element_ids.iter().any(|e| e == id)
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

impl ElementTrait for GroupElement {
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
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        is_point_in_rect(point, self.as_rect().inflate(tolerance, tolerance))
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }
}
