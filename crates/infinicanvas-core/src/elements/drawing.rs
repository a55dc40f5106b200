//! Freehand drawing element.

use super::{ElementId, ElementTrait, parse_hex_color};
use crate::geometry::{point_to_polyline_dist, points_bounds};
use kurbo::{BezPath, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// A single freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnPath {
    /// Points in canvas coordinates.
    pub points: Vec<Point>,
    /// Stroke colour as a hex string.
    pub color: String,
    /// Stroke width in canvas units.
    pub width: f64,
}

impl DrawnPath {
    /// Create an empty stroke with the given colour and width.
    pub fn new(color: impl Into<String>, width: f64) -> Self {
        Self {
            points: Vec::new(),
            color: color.into(),
            width,
        }
    }

    /// Add a point to the stroke.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Stroke colour as a peniko colour.
    pub fn stroke(&self) -> Color {
        parse_hex_color(&self.color)
    }

    /// Simplify the stroke by removing redundant points.
    pub fn simplify(&mut self, tolerance: f64) {
        if self.points.len() < 3 {
            return;
        }
        self.points = rdp_simplify(&self.points, tolerance);
    }

    pub fn bounds(&self) -> Rect {
        points_bounds(&self.points)
    }

    /// Check whether a point lies on the stroke, accounting for its width.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.points) <= tolerance + self.width / 2.0
    }

    /// Polyline path for rendering.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut iter = self.points.iter();
        if let Some(first) = iter.next() {
            path.move_to(*first);
            for point in iter {
                path.line_to(*point);
            }
        }
        path
    }
}

/// Ramer-Douglas-Peucker line simplification.
fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;

    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);
        // junction point appears in both halves
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Perpendicular distance from a point to the infinite line through two points.
fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let d = line_end - line_start;
    let line_len_sq = d.hypot2();
    if line_len_sq < f64::EPSILON {
        return (point - line_start).hypot();
    }
    let area2 = ((point.x - line_start.x) * d.y - (point.y - line_start.y) * d.x).abs();
    area2 / line_len_sq.sqrt()
}

/// A drawing made of one or more freehand strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingElement {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    pub z_index: i64,
    pub paths: Vec<DrawnPath>,
    pub stroke_color: String,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl DrawingElement {
    /// Build a drawing from strokes; the anchor is the top-left of their bounds.
    pub fn from_paths(
        id: impl Into<ElementId>,
        paths: Vec<DrawnPath>,
        stroke_color: impl Into<String>,
        stroke_width: f64,
    ) -> Self {
        let mut drawing = Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            z_index: 0,
            paths,
            stroke_color: stroke_color.into(),
            stroke_width,
            selected: None,
        };
        let origin = drawing.bounds().origin();
        drawing.x = origin.x;
        drawing.y = origin.y;
        drawing
    }
}

impl ElementTrait for DrawingElement {
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
        self.paths
            .iter()
            .filter(|p| !p.is_empty())
            .map(DrawnPath::bounds)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.paths.iter().any(|p| p.hit_test(point, tolerance))
    }

    fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        for path in &mut self.paths {
            for point in &mut path.points {
                *point += delta;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_path() -> DrawnPath {
        let mut path = DrawnPath::new("#000000", 2.0);
        path.add_point(Point::new(0.0, 0.0));
        path.add_point(Point::new(100.0, 0.0));
        path
    }

    #[test]
    fn test_simplify() {
        let mut path = DrawnPath::new("#000000", 2.0);
        for p in [(0.0, 0.0), (1.0, 0.1), (2.0, 0.0), (3.0, 0.1), (4.0, 0.0)] {
            path.add_point(Point::new(p.0, p.1));
        }
        path.simplify(0.5);
        assert!(path.len() < 5);
        assert_eq!(path.points.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(path.points.last(), Some(&Point::new(4.0, 0.0)));
    }

    #[test]
    fn test_simplify_keeps_corners() {
        let mut path = DrawnPath::new("#000000", 2.0);
        for p in [(0.0, 0.0), (50.0, 0.0), (50.0, 50.0)] {
            path.add_point(Point::new(p.0, p.1));
        }
        path.simplify(1.0);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_path_hit_test() {
        let path = line_path();
        assert!(path.hit_test(Point::new(50.0, 0.0), 5.0));
        assert!(path.hit_test(Point::new(50.0, 5.5), 5.0));
        assert!(!path.hit_test(Point::new(50.0, 20.0), 5.0));
    }

    #[test]
    fn test_drawing_anchor_and_translate() {
        let mut path = line_path();
        path.add_point(Point::new(100.0, 40.0));
        let mut drawing = DrawingElement::from_paths("d", vec![path], "#000000", 2.0);
        assert_eq!(drawing.position(), Point::new(0.0, 0.0));
        assert_eq!(drawing.bounds(), Rect::new(0.0, 0.0, 100.0, 40.0));

        drawing.translate(Vec2::new(10.0, 5.0));
        assert_eq!(drawing.position(), Point::new(10.0, 5.0));
        assert_eq!(drawing.bounds(), Rect::new(10.0, 5.0, 110.0, 45.0));
    }

    #[test]
    fn test_to_path_empty() {
        let path = DrawnPath::new("#000000", 1.0);
        assert!(path.to_path().elements().is_empty());
    }
}
