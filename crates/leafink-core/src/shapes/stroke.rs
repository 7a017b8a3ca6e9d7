//! Freehand strokes (brush and eraser).

use super::{Geometry, SerializableColor, point_to_polyline_dist};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// How a stroke is composited onto what is already on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeMode {
    /// Normal additive paint.
    #[default]
    SourceOver,
    /// Subtracts from existing pixels (eraser).
    DestinationOut,
}

/// A freehand path captured from pointer input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Path points relative to the object origin, stored as `[x, y]` pairs.
    #[serde(with = "point_pairs")]
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub width: f64,
    #[serde(default)]
    pub composite: CompositeMode,
}

impl Stroke {
    /// Create a stroke from origin-relative points.
    pub fn new(points: Vec<Point>, color: SerializableColor, width: f64) -> Self {
        Self {
            points,
            color,
            width,
            composite: CompositeMode::SourceOver,
        }
    }

    /// Set the composite mode.
    pub fn with_composite(mut self, composite: CompositeMode) -> Self {
        self.composite = composite;
        self
    }

    /// Split page-space points into an origin (top-left of their bounding
    /// box) and points relative to that origin.
    pub fn normalize(page_points: &[Point]) -> (Point, Vec<Point>) {
        let Some(first) = page_points.first() else {
            return (Point::ZERO, Vec::new());
        };
        let origin = page_points
            .iter()
            .fold(*first, |min, p| Point::new(min.x.min(p.x), min.y.min(p.y)));
        let offset = origin.to_vec2();
        let local = page_points.iter().map(|p| *p - offset).collect();
        (origin, local)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_eraser(&self) -> bool {
        self.composite == CompositeMode::DestinationOut
    }
}

impl Geometry for Stroke {
    fn local_bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        let bounds = self
            .points
            .iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p));
        let half = self.width / 2.0;
        bounds.inflate(half, half)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        point_to_polyline_dist(point, &self.points) <= tolerance + self.width / 2.0
    }
}

/// Serde adapter writing points as nested `[x, y]` arrays.
mod point_pairs {
    use kurbo::Point;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(points: &[Point], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(points.len()))?;
        for p in points {
            seq.serialize_element(&[p.x, p.y])?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
        let pairs = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Ok(pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect())
    }
}
