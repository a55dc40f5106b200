//! Connector element linking two other elements.

use super::{ElementId, ElementTrait, parse_hex_color};
use crate::geometry::{point_to_polyline_dist, points_bounds};
use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// A polyline connecting a source element to a target element.
///
/// The endpoints follow the linked elements; only the intermediate control
/// points are stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorElement {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    pub z_index: i64,
    pub source_id: ElementId,
    pub target_id: ElementId,
    #[serde(default)]
    pub control_points: Vec<Point>,
    pub stroke_color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_dash: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl ConnectorElement {
    pub fn new(
        id: impl Into<ElementId>,
        source_id: impl Into<ElementId>,
        target_id: impl Into<ElementId>,
    ) -> Self {
        Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            z_index: 0,
            source_id: source_id.into(),
            target_id: target_id.into(),
            control_points: Vec::new(),
            stroke_color: "#000000".to_string(),
            stroke_width: 2.0,
            stroke_dash: None,
            selected: None,
        }
    }

    /// Whether the connector references the given element at either end.
    pub fn touches(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }

    pub fn stroke(&self) -> Color {
        parse_hex_color(&self.stroke_color)
    }

    /// Full route from a source anchor through the control points to a target anchor.
    pub fn route(&self, source: Point, target: Point) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.control_points.len() + 2);
        points.push(source);
        points.extend(self.control_points.iter().copied());
        points.push(target);
        points
    }
}

impl ElementTrait for ConnectorElement {
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
        if self.control_points.is_empty() {
            let p = self.position();
            return Rect::from_points(p, p);
        }
        points_bounds(&self.control_points)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.control_points) <= tolerance + self.stroke_width / 2.0
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        for p in &mut self.control_points {
            *p += delta;
        }
    }
}
