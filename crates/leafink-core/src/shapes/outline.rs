//! Circle and rectangle outlines placed by the shape tools.

use super::{Geometry, SerializableColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Which outline tool produced the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Circle,
    Rectangle,
}

/// A stroked outline occupying `(0, 0, width, height)` in local space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub kind: ShapeKind,
    pub width: f64,
    pub height: f64,
    pub stroke_color: SerializableColor,
    pub stroke_width: f64,
    /// Fill color (None = transparent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<SerializableColor>,
}

impl Outline {
    pub fn new(kind: ShapeKind, width: f64, height: f64) -> Self {
        Self {
            kind,
            width,
            height,
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill: None,
        }
    }

    /// Create a circle with the given radius.
    pub fn circle(radius: f64) -> Self {
        Self::new(ShapeKind::Circle, radius * 2.0, radius * 2.0)
    }

    /// Set stroke color and width.
    pub fn with_stroke(mut self, color: SerializableColor, width: f64) -> Self {
        self.stroke_color = color;
        self.stroke_width = width;
        self
    }

    fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    fn hit_ellipse(&self, point: Point, tolerance: f64) -> bool {
        let rx = self.width / 2.0;
        let ry = self.height / 2.0;
        let half_sw = self.stroke_width / 2.0;
        let dx_outer = (point.x - rx) / (rx + tolerance + half_sw);
        let dy_outer = (point.y - ry) / (ry + tolerance + half_sw);
        if dx_outer * dx_outer + dy_outer * dy_outer > 1.0 {
            return false;
        }
        if self.fill.is_some() {
            return true;
        }
        // Outline only: reject if inside inner ellipse
        let inner_rx = (rx - tolerance - half_sw).max(0.0);
        let inner_ry = (ry - tolerance - half_sw).max(0.0);
        if inner_rx < f64::EPSILON || inner_ry < f64::EPSILON {
            return true;
        }
        let dx_inner = (point.x - rx) / inner_rx;
        let dy_inner = (point.y - ry) / inner_ry;
        dx_inner * dx_inner + dy_inner * dy_inner > 1.0
    }

    fn hit_rect(&self, point: Point, tolerance: f64) -> bool {
        let rect = self.as_rect();
        if self.fill.is_some() {
            return rect.inflate(tolerance, tolerance).contains(point);
        }
        let band = tolerance + self.stroke_width / 2.0;
        let outer = rect.inflate(band, band);
        let inner = rect.inflate(-band, -band);
        outer.contains(point) && !inner.contains(point)
    }
}

impl Geometry for Outline {
    fn local_bounds(&self) -> Rect {
        let half = self.stroke_width / 2.0;
        self.as_rect().inflate(half, half)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        match self.kind {
            ShapeKind::Circle => self.hit_ellipse(point, tolerance),
            ShapeKind::Rectangle => self.hit_rect(point, tolerance),
        }
    }
}
