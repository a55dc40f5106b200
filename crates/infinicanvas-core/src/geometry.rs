//! Geometry helpers shared by the store, gestures and layer panel.

use kurbo::{Point, Rect, Vec2};
use uuid::Uuid;

/// Generate a unique identifier for a canvas element.
pub fn generate_unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used as the initial z-index of freshly placed images so that newer images
/// land on top of older ones.
pub fn now_millis() -> i64 {
    #[cfg(not(target_arch = "wasm32"))]
    use std::time::{SystemTime, UNIX_EPOCH};
    #[cfg(target_arch = "wasm32")]
    use web_time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Euclidean distance between two points.
pub fn calculate_distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}

/// Check whether a point lies inside a rectangle, edges included.
pub fn is_point_in_rect(point: Point, rect: Rect) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

/// Bounding box of a set of rectangles. An empty set yields `Rect::ZERO`.
pub fn calculate_bounding_box<I>(rects: I) -> Rect
where
    I: IntoIterator<Item = Rect>,
{
    rects
        .into_iter()
        .reduce(|acc, r| acc.union(r))
        .unwrap_or(Rect::ZERO)
}

/// Convert a canvas point to screen space for the given offset and scale.
pub fn canvas_to_screen_coords(point: Point, offset: Vec2, scale: f64) -> Point {
    Point::new(point.x * scale + offset.x, point.y * scale + offset.y)
}

/// Convert a screen point to canvas space for the given offset and scale.
pub fn screen_to_canvas_coords(point: Point, offset: Vec2, scale: f64) -> Point {
    Point::new((point.x - offset.x) / scale, (point.y - offset.y) / scale)
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (point - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Axis-aligned bounds of a point set. An empty set yields `Rect::ZERO`.
pub fn points_bounds(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids() {
        let a = generate_unique_id();
        let b = generate_unique_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_distance() {
        let d = calculate_distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_point_in_rect_inclusive() {
        let rect = Rect::new(10.0, 10.0, 110.0, 60.0);
        assert!(is_point_in_rect(Point::new(10.0, 10.0), rect));
        assert!(is_point_in_rect(Point::new(110.0, 60.0), rect));
        assert!(is_point_in_rect(Point::new(50.0, 30.0), rect));
        assert!(!is_point_in_rect(Point::new(110.1, 30.0), rect));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box([
            Rect::new(0.0, 0.0, 100.0, 50.0),
            Rect::new(200.0, 200.0, 250.0, 300.0),
        ]);
        assert_eq!(bbox, Rect::new(0.0, 0.0, 250.0, 300.0));
    }

    #[test]
    fn test_bounding_box_empty() {
        assert_eq!(calculate_bounding_box(Vec::<Rect>::new()), Rect::ZERO);
    }

    #[test]
    fn test_coords_roundtrip() {
        let offset = Vec2::new(30.0, -20.0);
        let scale = 1.5;
        let screen = Point::new(123.0, 456.0);
        let canvas = screen_to_canvas_coords(screen, offset, scale);
        let back = canvas_to_screen_coords(canvas, offset, scale);
        assert!((back.x - screen.x).abs() < 1e-9);
        assert!((back.y - screen.y).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_distance() {
        let pts = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        assert!((point_to_polyline_dist(Point::new(50.0, 10.0), &pts) - 10.0).abs() < 1e-9);
        assert!(point_to_polyline_dist(Point::ZERO, &[]).is_infinite());
    }
}
